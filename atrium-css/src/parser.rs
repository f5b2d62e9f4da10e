//! CSS Parser - rule-list parsing for the scoper
//!
//! A small char-cursor parser that recovers the structure the scoper needs:
//! selector lists, declaration blocks, conditional group rules, and the
//! scoping escape-hatch comments. Declarations are captured verbatim.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::stylesheet::{ContainerRule, Rule, ScopeHint, StyleRule, Stylesheet};

/// Comment opening the "leave the next rule alone" escape hatch.
const IGNORE_NEXT: &str = "atrium-ignore-next";
/// Comment prefix listing selectors the scoper must leave alone.
const IGNORE_LIST: &str = "atrium-ignore:";
/// Comment pair bracketing a region the scoper must leave alone.
const IGNORE_START: &str = "atrium-ignore-start";
const IGNORE_END: &str = "atrium-ignore-end";

/// CSS parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Unexpected end of input
    UnexpectedEof,
    /// Unexpected token
    UnexpectedToken(String),
    /// Unclosed block
    UnclosedBlock,
    /// Unclosed string
    UnclosedString,
    /// Unclosed comment
    UnclosedComment,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof => write!(f, "Unexpected end of input"),
            ParseError::UnexpectedToken(t) => write!(f, "Unexpected token: {}", t),
            ParseError::UnclosedBlock => write!(f, "Unclosed block"),
            ParseError::UnclosedString => write!(f, "Unclosed string"),
            ParseError::UnclosedComment => write!(f, "Unclosed comment"),
        }
    }
}

/// CSS parser.
pub struct CssParser<'a> {
    input: &'a str,
    pos: usize,
    /// Hint armed by the most recent escape-hatch comment.
    pending_hint: Option<ScopeHint>,
    /// Inside an ignore-start/ignore-end region.
    region_ignored: bool,
}

impl<'a> CssParser<'a> {
    /// Create a new parser for the given input.
    pub fn new(input: &'a str) -> Self {
        CssParser {
            input,
            pos: 0,
            pending_hint: None,
            region_ignored: false,
        }
    }

    /// Parse a complete stylesheet.
    pub fn parse_stylesheet(&mut self) -> Result<Stylesheet, ParseError> {
        let mut stylesheet = Stylesheet::new();
        let rules = self.parse_rule_list(false)?;
        stylesheet.rules = rules;
        Ok(stylesheet)
    }

    /// Parse rules until EOF, or until a closing '}' when `nested`.
    fn parse_rule_list(&mut self, nested: bool) -> Result<Vec<Rule>, ParseError> {
        let mut rules = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;
            match self.peek_char() {
                None => {
                    if nested {
                        return Err(ParseError::UnclosedBlock);
                    }
                    break;
                }
                Some('}') if nested => {
                    self.consume_char();
                    break;
                }
                Some('@') => rules.push(self.parse_at_rule()?),
                Some(_) => rules.push(Rule::Style(self.parse_style_rule()?)),
            }
        }

        Ok(rules)
    }

    /// Parse a style rule (selector list + declaration block).
    fn parse_style_rule(&mut self) -> Result<StyleRule, ParseError> {
        let selector_text = self.consume_until_block_open()?;
        if self.consume_char() != Some('{') {
            return Err(ParseError::UnexpectedToken("expected '{'".into()));
        }
        let declarations = self.consume_block_body()?;

        Ok(StyleRule {
            selectors: split_selectors(&selector_text),
            declarations: declarations.trim().to_string(),
            hint: self.take_hint(),
        })
    }

    /// Parse an at-rule. Conditional group rules recurse; everything else is
    /// carried through verbatim.
    fn parse_at_rule(&mut self) -> Result<Rule, ParseError> {
        let start = self.pos;
        self.consume_char(); // '@'
        let name = self.consume_ident();

        match name.as_str() {
            "media" | "supports" => {
                let condition_tail = self.consume_until_block_open()?;
                if self.consume_char() != Some('{') {
                    return Err(ParseError::UnexpectedToken("expected '{'".into()));
                }
                let condition = self.input[start..start + 1 + name.len()].to_string()
                    + " "
                    + condition_tail.trim();
                let rules = self.parse_rule_list(true)?;
                Ok(Rule::Container(ContainerRule {
                    condition: condition.trim_end().to_string(),
                    rules,
                }))
            }
            _ => {
                // Statement at-rules end at ';', block at-rules at the
                // matching '}'. Either way the text passes through as-is.
                let body = self.consume_statement_or_block()?;
                self.take_hint();
                Ok(Rule::Other(
                    self.input[start..start + 1 + name.len()].to_string() + &body,
                ))
            }
        }
    }

    /// Take the hint for the rule being finished.
    fn take_hint(&mut self) -> ScopeHint {
        if self.region_ignored {
            self.pending_hint = None;
            return ScopeHint::IgnoreAll;
        }
        self.pending_hint.take().unwrap_or_default()
    }

    /// Interpret one comment body as an escape-hatch directive.
    fn apply_comment(&mut self, body: &str) {
        let body = body.trim();
        if body == IGNORE_NEXT {
            self.pending_hint = Some(ScopeHint::IgnoreAll);
        } else if let Some(list) = body.strip_prefix(IGNORE_LIST) {
            let selectors = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            self.pending_hint = Some(ScopeHint::IgnoreSelectors(selectors));
        } else if body == IGNORE_START {
            self.region_ignored = true;
        } else if body == IGNORE_END {
            self.region_ignored = false;
        }
    }

    // Cursor helpers

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ParseError> {
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                self.consume_char();
            }
            if self.starts_with("/*") {
                self.pos += 2;
                let end = self.input[self.pos..]
                    .find("*/")
                    .ok_or(ParseError::UnclosedComment)?;
                let body = self.input[self.pos..self.pos + end].to_string();
                self.pos += end + 2;
                self.apply_comment(&body);
            } else {
                return Ok(());
            }
        }
    }

    fn consume_ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            self.consume_char();
        }
        self.input[start..self.pos].to_string()
    }

    /// Consume text up to (not including) the next top-level '{'.
    fn consume_until_block_open(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        loop {
            match self.peek_char() {
                None => return Err(ParseError::UnexpectedEof),
                Some('{') => break,
                Some('"') | Some('\'') => self.consume_string()?,
                Some('(') => self.consume_balanced('(', ')')?,
                Some('[') => self.consume_balanced('[', ']')?,
                Some(_) => {
                    self.consume_char();
                }
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// Consume a block body after its '{', through the matching '}'.
    /// Returns the body without braces.
    fn consume_block_body(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.peek_char() {
                None => return Err(ParseError::UnclosedBlock),
                Some('"') | Some('\'') => self.consume_string()?,
                Some('{') => {
                    depth += 1;
                    self.consume_char();
                }
                Some('}') => {
                    depth -= 1;
                    self.consume_char();
                    if depth == 0 {
                        return Ok(self.input[start..self.pos - 1].to_string());
                    }
                }
                Some(_) => {
                    self.consume_char();
                }
            }
        }
    }

    /// Consume through the terminating ';' of a statement at-rule, or the
    /// matching '}' of a block at-rule, whichever comes first at top level.
    fn consume_statement_or_block(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        loop {
            match self.peek_char() {
                None => return Err(ParseError::UnexpectedEof),
                Some(';') => {
                    self.consume_char();
                    return Ok(self.input[start..self.pos].to_string());
                }
                Some('"') | Some('\'') => self.consume_string()?,
                Some('{') => {
                    self.consume_char();
                    let mut depth = 1usize;
                    loop {
                        match self.peek_char() {
                            None => return Err(ParseError::UnclosedBlock),
                            Some('"') | Some('\'') => self.consume_string()?,
                            Some('{') => {
                                depth += 1;
                                self.consume_char();
                            }
                            Some('}') => {
                                depth -= 1;
                                self.consume_char();
                                if depth == 0 {
                                    return Ok(self.input[start..self.pos].to_string());
                                }
                            }
                            Some(_) => {
                                self.consume_char();
                            }
                        }
                    }
                }
                Some(_) => {
                    self.consume_char();
                }
            }
        }
    }

    fn consume_string(&mut self) -> Result<(), ParseError> {
        let quote = self.consume_char().ok_or(ParseError::UnexpectedEof)?;
        loop {
            match self.consume_char() {
                None => return Err(ParseError::UnclosedString),
                Some('\\') => {
                    self.consume_char();
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn consume_balanced(&mut self, open: char, close: char) -> Result<(), ParseError> {
        self.consume_char(); // open
        let mut depth = 1usize;
        loop {
            match self.peek_char() {
                None => return Err(ParseError::UnclosedBlock),
                Some('"') | Some('\'') => self.consume_string()?,
                Some(c) if c == open => {
                    depth += 1;
                    self.consume_char();
                }
                Some(c) if c == close => {
                    depth -= 1;
                    self.consume_char();
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {
                    self.consume_char();
                }
            }
        }
    }
}

/// Split a selector list at top-level commas, trimming each selector.
pub fn split_selectors(text: &str) -> Vec<String> {
    let mut selectors = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut current = String::new();

    for c in text.chars() {
        if escaped {
            escaped = false;
            current.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                current.push(c);
            }
            '"' | '\'' => {
                match quote {
                    None => quote = Some(c),
                    Some(q) if q == c => quote = None,
                    Some(_) => {}
                }
                current.push(c);
            }
            '(' | '[' if quote.is_none() => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' if quote.is_none() => {
                depth -= 1;
                current.push(c);
            }
            ',' if quote.is_none() && depth == 0 => {
                let sel = current.trim();
                if !sel.is_empty() {
                    selectors.push(sel.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let sel = current.trim();
    if !sel.is_empty() {
        selectors.push(sel.to_string());
    }
    selectors
}
