//! Style Scoping Engine
//!
//! Rewrites a stylesheet so its selectors only match inside one
//! application's rendering container, and completes `url()` references
//! against the stylesheet's resolved base path.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use bitflags::bitflags;

use atrium_types::name::container_prefix;
use atrium_types::url::Url;

use crate::parser::{CssParser, ParseError};
use crate::stylesheet::{Rule, ScopeHint, StyleRule, Stylesheet};

bitflags! {
    /// Browser-engine quirks the scoper compensates for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EngineQuirks: u8 {
        /// Safari-family engines: relativize same-origin absolute URLs and
        /// re-quote unquoted `content:` values.
        const SAFARI_CONTENT = 1 << 0;
    }
}

/// Selector aliases that refer to the document root scope.
const ROOT_ALIASES: &[&str] = &["html body", ":root", "html", "body"];

/// Reusable scratch parsing space shared across scoping calls.
///
/// One instance stands in for the single hidden stylesheet element the
/// scoper parses into; its buffer is cleared and the sheet disabled
/// immediately after each use.
#[derive(Debug, Default)]
pub struct ScratchSheet {
    buffer: String,
    disabled: bool,
}

impl ScratchSheet {
    /// Create a new scratch sheet.
    pub fn new() -> Self {
        ScratchSheet {
            buffer: String::new(),
            disabled: true,
        }
    }

    /// Whether the sheet is currently disabled (always true between calls).
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Parse style text into a rule list using this sheet as scratch space.
    pub fn parse(&mut self, text: &str) -> Result<Stylesheet, ParseError> {
        self.disabled = false;
        self.buffer.clear();
        self.buffer.push_str(text);
        let result = CssParser::new(&self.buffer).parse_stylesheet();
        self.buffer.clear();
        self.disabled = true;
        result
    }
}

/// The style scoping engine for one application.
#[derive(Debug, Clone)]
pub struct StyleScoper {
    /// Selector prefix, e.g. `atrium-app[name=app1]`.
    prefix: String,
    /// Base URL of the owning stylesheet resource, for `url()` completion.
    base: Option<Url>,
    /// Engine quirks in effect.
    quirks: EngineQuirks,
}

impl StyleScoper {
    /// Create a scoper for the named application.
    pub fn new(app_name: &str) -> Self {
        StyleScoper {
            prefix: container_prefix(app_name),
            base: None,
            quirks: EngineQuirks::empty(),
        }
    }

    /// Set the base URL used to complete relative `url()` references.
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the engine quirks in effect.
    pub fn with_quirks(mut self, quirks: EngineQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Get the selector prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scope a stylesheet's text. Pure with respect to engine state; the
    /// scratch sheet is only reused parsing space.
    pub fn scope(&self, text: &str, scratch: &mut ScratchSheet) -> Result<String, ParseError> {
        let mut sheet = scratch.parse(text)?;
        self.scope_rules(&mut sheet.rules);
        Ok(sheet.to_css())
    }

    fn scope_rules(&self, rules: &mut Vec<Rule>) {
        for rule in rules {
            match rule {
                Rule::Style(style) => self.scope_style_rule(style),
                Rule::Container(container) => self.scope_rules(&mut container.rules),
                Rule::Other(_) => {}
            }
        }
    }

    fn scope_style_rule(&self, rule: &mut StyleRule) {
        match &rule.hint {
            ScopeHint::IgnoreAll => {}
            ScopeHint::IgnoreSelectors(keep) => {
                for sel in rule.selectors.iter_mut() {
                    if !keep.iter().any(|k| k == sel) {
                        *sel = self.scope_selector(sel);
                    }
                }
            }
            ScopeHint::Normal => {
                for sel in rule.selectors.iter_mut() {
                    *sel = self.scope_selector(sel);
                }
            }
        }
        rule.declarations = self.rewrite_declarations(&rule.declarations);
    }

    /// Rewrite one selector. Already-scoped selectors pass through, so
    /// scoping is idempotent.
    pub fn scope_selector(&self, selector: &str) -> String {
        let sel = selector.trim();
        if sel.starts_with(self.prefix.as_str()) {
            return sel.to_string();
        }
        if sel == "*" {
            return format!("{} *", self.prefix);
        }
        if let Some(alias_len) = leading_root_alias(sel) {
            let rest = sel[alias_len..].trim_start();
            if rest.is_empty() {
                // The selector is exactly a root alias.
                return self.prefix.clone();
            }
            if matches!(rest.chars().next(), Some('>') | Some('+') | Some('~')) {
                // Compounds already anchored to the root keep their anchor.
                return sel.to_string();
            }
            // Descendant of root: the root reference becomes the prefix.
            return format!("{} {}", self.prefix, rest);
        }
        format!("{} {}", self.prefix, sel)
    }

    /// Complete `url()` references and apply quirk rewrites to one
    /// declaration block.
    pub fn rewrite_declarations(&self, declarations: &str) -> String {
        let completed = self.complete_urls(declarations);
        if self.quirks.contains(EngineQuirks::SAFARI_CONTENT) {
            requote_content(&completed)
        } else {
            completed
        }
    }

    fn complete_urls(&self, declarations: &str) -> String {
        let mut out = String::with_capacity(declarations.len());
        let mut rest = declarations;

        while let Some(idx) = find_url_open(rest) {
            out.push_str(&rest[..idx]);
            rest = &rest[idx..];
            let open = rest.find('(').map(|p| p + 1).unwrap_or(rest.len());
            let close = match find_close_paren(&rest[open..]) {
                Some(p) => open + p,
                None => break,
            };
            let raw = rest[open..close].trim();
            let inner = raw.trim_matches(|c| c == '"' || c == '\'');
            out.push_str("url(\"");
            out.push_str(&self.complete_one(inner));
            out.push_str("\")");
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        out
    }

    fn complete_one(&self, reference: &str) -> String {
        if reference.is_empty() || Url::is_data(reference) || reference.starts_with('#') {
            return reference.to_string();
        }
        let base = match &self.base {
            Some(base) => base,
            None => return reference.to_string(),
        };
        if Url::is_absolute(reference) {
            if self.quirks.contains(EngineQuirks::SAFARI_CONTENT) && base.same_origin(reference)
            {
                return base.relativize(reference).to_string();
            }
            return reference.to_string();
        }
        if self.quirks.contains(EngineQuirks::SAFARI_CONTENT) && reference.starts_with('/') {
            return reference.to_string();
        }
        base.resolve(reference)
    }
}

/// Match a leading root alias followed by end-of-selector, whitespace, or a
/// combinator. Returns the alias length.
fn leading_root_alias(sel: &str) -> Option<usize> {
    for alias in ROOT_ALIASES {
        if let Some(rest) = sel.strip_prefix(alias) {
            match rest.chars().next() {
                None => return Some(alias.len()),
                Some(c) if c.is_whitespace() || c == '>' || c == '+' || c == '~' => {
                    return Some(alias.len())
                }
                _ => {}
            }
        }
    }
    None
}

/// Find the closing parenthesis of a `url(` value, honoring quoted
/// sections so a `)` inside quotes does not terminate the scan.
fn find_close_paren(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                ')' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// Find the next `url(` token outside of strings, case-insensitive.
fn find_url_open(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i + 4 <= bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if text[i..].len() >= 4 && text[i..i + 4].eq_ignore_ascii_case("url(") {
                    let boundary = i == 0
                        || !(bytes[i - 1].is_ascii_alphanumeric()
                            || bytes[i - 1] == b'-'
                            || bytes[i - 1] == b'_');
                    if boundary {
                        return Some(i);
                    }
                }
            }
        }
        i += 1;
    }
    None
}

/// Re-quote unquoted `content:` values for Safari-family engines.
fn requote_content(declarations: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for decl in declarations.split(';') {
        let trimmed = decl.trim();
        if let Some((prop, value)) = trimmed.split_once(':') {
            if prop.trim().eq_ignore_ascii_case("content") {
                let value = value.trim();
                if needs_content_quotes(value) {
                    parts.push(format!("content: \"{}\"", value));
                    continue;
                }
            }
        }
        parts.push(decl.to_string());
    }
    parts.join(";")
}

fn needs_content_quotes(value: &str) -> bool {
    if value.is_empty() || value.starts_with('"') || value.starts_with('\'') {
        return false;
    }
    const KEYWORDS: &[&str] = &["none", "normal", "inherit", "initial", "unset"];
    if KEYWORDS.iter().any(|k| value.eq_ignore_ascii_case(k)) {
        return false;
    }
    // Functional values keep their syntax.
    !value.contains('(')
}

/// Deferred scoping for a style element whose text is not yet populated.
///
/// Stands in for the structural-mutation observer: `feed` is called when
/// text appears; the first non-empty feed scopes and disarms.
#[derive(Debug)]
pub struct PendingScope {
    scoper: StyleScoper,
    armed: bool,
}

impl PendingScope {
    /// Create an armed pending scope.
    pub fn new(scoper: StyleScoper) -> Self {
        PendingScope {
            scoper,
            armed: true,
        }
    }

    /// Whether the observer is still waiting for text.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Offer newly assigned text. Returns the scoped text on the first
    /// non-empty offer, then disarms permanently.
    pub fn feed(
        &mut self,
        text: &str,
        scratch: &mut ScratchSheet,
    ) -> Option<Result<String, ParseError>> {
        if !self.armed || text.trim().is_empty() {
            return None;
        }
        self.armed = false;
        Some(self.scoper.scope(text, scratch))
    }
}
