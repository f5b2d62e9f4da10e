//! Stylesheet - rule list representation
//!
//! The scoper never needs computed values, so declarations are kept as raw
//! text; only selector lists and at-rule nesting are modeled structurally.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A parsed stylesheet: an ordered rule list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Create a new empty stylesheet.
    pub fn new() -> Self {
        Stylesheet { rules: Vec::new() }
    }

    /// Add a rule to the stylesheet.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Get the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Serialize the rule list back to CSS text.
    pub fn to_css(&self) -> String {
        let mut out = String::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            rule.write(&mut out);
        }
        out
    }
}

/// A stylesheet rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// An ordinary style rule (selectors + declaration block).
    Style(StyleRule),
    /// A conditional group rule (@media, @supports) with nested rules.
    Container(ContainerRule),
    /// Any other rule, carried through verbatim (@keyframes, @font-face,
    /// @import, @charset, ...).
    Other(String),
}

impl Rule {
    fn write(&self, out: &mut String) {
        match self {
            Rule::Style(rule) => rule.write(out),
            Rule::Container(rule) => rule.write(out),
            Rule::Other(text) => out.push_str(text),
        }
    }
}

/// How the scoper should treat one style rule, derived from the
/// special-comment protocol at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScopeHint {
    /// Prefix selectors normally.
    #[default]
    Normal,
    /// Leave the whole rule untouched.
    IgnoreAll,
    /// Leave the listed selectors untouched, prefix the rest.
    IgnoreSelectors(Vec<String>),
}

/// A style rule.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    /// Comma-separated selectors, split at top level, each trimmed.
    pub selectors: Vec<String>,
    /// Raw declaration-block text, trimmed, without braces.
    pub declarations: String,
    /// Scoping directive attached by a preceding special comment.
    pub hint: ScopeHint,
}

impl StyleRule {
    fn write(&self, out: &mut String) {
        for (i, sel) in self.selectors.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(sel);
        }
        out.push('{');
        out.push_str(&self.declarations);
        out.push('}');
    }
}

/// A conditional group rule: condition text plus nested rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRule {
    /// Full condition prelude, e.g. `@media screen and (max-width: 40em)`.
    pub condition: String,
    /// The nested rule list.
    pub rules: Vec<Rule>,
}

impl ContainerRule {
    fn write(&self, out: &mut String) {
        out.push_str(&self.condition);
        out.push('{');
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            rule.write(out);
        }
        out.push('}');
    }
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}
