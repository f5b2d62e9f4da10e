//! Markup parsing - application source to document fragment
//!
//! A small forgiving HTML parser, just enough for the resource extraction
//! pipeline: elements with attributes, text, comments, raw-text elements
//! (script/style/title), void elements, and head/body region tracking.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::document::{Document, DOCUMENT_NODE};
use crate::node::{Attribute, NodeId};

/// Markup parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// The source text was empty.
    Empty,
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupError::Empty => write!(f, "Empty markup source"),
        }
    }
}

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "title", "textarea"];

/// Void elements never take children.
const VOID_ELEMENTS: &[&str] = &[
    "br", "hr", "img", "input", "meta", "link", "area", "base", "col", "embed", "param", "source",
    "track", "wbr",
];

/// Parse markup into a fragment document. The fragment's head/body regions
/// are recorded when the source declares them.
pub fn parse_fragment(markup: &str) -> Result<Document, MarkupError> {
    if markup.trim().is_empty() {
        return Err(MarkupError::Empty);
    }

    let mut doc = Document::new();
    let mut parser = MarkupParser::new(markup);
    let mut stack: Vec<NodeId> = alloc::vec![DOCUMENT_NODE];

    loop {
        match parser.next_token() {
            MarkupToken::Eof => break,
            MarkupToken::Comment(text) => {
                let node = doc.create_comment(&text);
                attach(&mut doc, &stack, node);
            }
            MarkupToken::Text(text) => {
                if !text.trim().is_empty() {
                    let node = doc.create_text(&text);
                    attach(&mut doc, &stack, node);
                }
            }
            MarkupToken::OpenTag {
                name,
                attrs,
                self_closing,
            } => {
                let tag = name.to_ascii_lowercase();
                let attributes = attrs
                    .into_iter()
                    .map(|(n, v)| Attribute::new(&n, &v))
                    .collect();
                let node = doc.create_element(&tag, attributes);
                attach(&mut doc, &stack, node);

                match tag.as_str() {
                    "head" => doc.set_head(Some(node)),
                    "body" => doc.set_body(Some(node)),
                    _ => {}
                }

                if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    let raw = parser.read_raw_text(&tag);
                    if !raw.is_empty() {
                        let text = doc.create_text(&raw);
                        // Infallible: both ids were just created.
                        let _ = doc.append(node, text);
                    }
                } else if !self_closing {
                    stack.push(node);
                }
            }
            MarkupToken::CloseTag { name } => {
                let tag = name.to_ascii_lowercase();
                // Pop to the nearest matching open element; stray close
                // tags are dropped.
                if let Some(pos) = stack
                    .iter()
                    .rposition(|&id| doc.get(id).and_then(|n| n.tag_name()) == Some(tag.as_str()))
                {
                    stack.truncate(pos);
                }
                if stack.is_empty() {
                    stack.push(DOCUMENT_NODE);
                }
            }
        }
    }

    Ok(doc)
}

fn attach(doc: &mut Document, stack: &[NodeId], node: NodeId) {
    if let Some(&parent) = stack.last() {
        // Infallible: parent comes from the open-element stack.
        let _ = doc.append(parent, node);
    }
}

/// Markup token.
#[derive(Debug)]
enum MarkupToken {
    OpenTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    CloseTag {
        name: String,
    },
    Text(String),
    Comment(String),
    Eof,
}

/// Forgiving markup tokenizer.
struct MarkupParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> MarkupParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn next_token(&mut self) -> MarkupToken {
        if self.pos >= self.input.len() {
            return MarkupToken::Eof;
        }

        if self.starts_with("<!--") {
            self.pos += 4;
            let end = self.input[self.pos..].find("-->");
            let body = match end {
                Some(end) => {
                    let body = self.input[self.pos..self.pos + end].to_string();
                    self.pos += end + 3;
                    body
                }
                None => {
                    let body = self.input[self.pos..].to_string();
                    self.pos = self.input.len();
                    body
                }
            };
            return MarkupToken::Comment(body);
        }

        if self.starts_with("<!") {
            // Doctype; skip.
            if let Some(end) = self.input[self.pos..].find('>') {
                self.pos += end + 1;
            } else {
                self.pos = self.input.len();
            }
            return self.next_token();
        }

        if self.starts_with("</") {
            self.pos += 2;
            let name = self.read_tag_name();
            self.skip_until('>');
            self.pos = (self.pos + 1).min(self.input.len());
            return MarkupToken::CloseTag { name };
        }

        if self.starts_with("<") {
            self.pos += 1;
            let name = self.read_tag_name();
            let attrs = self.read_attributes();
            let self_closing = self.consume_if("/");
            self.skip_until('>');
            self.pos = (self.pos + 1).min(self.input.len());

            let is_void = VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str());
            return MarkupToken::OpenTag {
                name,
                attrs,
                self_closing: self_closing || is_void,
            };
        }

        // Text content up to the next tag.
        let start = self.pos;
        while self.pos < self.input.len() && !self.starts_with("<") {
            self.pos += self.input[self.pos..]
                .chars()
                .next()
                .map(|c| c.len_utf8())
                .unwrap_or(1);
        }
        MarkupToken::Text(self.input[start..self.pos].to_string())
    }

    /// Read raw text content up to (and consuming) the matching close tag.
    fn read_raw_text(&mut self, tag: &str) -> String {
        let close_tag = format!("</{}", tag);
        let start = self.pos;
        let mut end = self.input.len();
        let lower = self.input[self.pos..].to_ascii_lowercase();
        if let Some(found) = lower.find(&close_tag) {
            end = self.pos + found;
        }
        let raw = self.input[start..end].to_string();
        self.pos = end;
        if self.pos < self.input.len() {
            self.pos += close_tag.len();
            self.skip_until('>');
            self.pos = (self.pos + 1).min(self.input.len());
        }
        raw
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn consume_if(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn skip_until(&mut self, target: char) {
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch == target {
                return;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn read_tag_name(&mut self) -> String {
        let start = self.pos;
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn read_attributes(&mut self) -> Vec<(String, String)> {
        let mut attrs = Vec::new();

        loop {
            self.skip_whitespace();
            if self.pos >= self.input.len() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }

            let name = self.read_attr_name();
            if name.is_empty() {
                break;
            }

            self.skip_whitespace();
            if self.consume_if("=") {
                self.skip_whitespace();
                let value = self.read_attr_value();
                attrs.push((name, value));
            } else {
                // Boolean attribute
                attrs.push((name, String::new()));
            }
        }

        attrs
    }

    fn read_attr_name(&mut self) -> String {
        let start = self.pos;
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' || ch == ':' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn read_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.starts_with(&quote.to_string()) {
                self.pos += 1;
                let start = self.pos;
                while let Some(ch) = self.input[self.pos..].chars().next() {
                    if ch == quote {
                        break;
                    }
                    self.pos += ch.len_utf8();
                }
                let value = self.input[start..self.pos].to_string();
                if self.pos < self.input.len() {
                    self.pos += 1;
                }
                return value;
            }
        }

        // Unquoted value
        let start = self.pos;
        while let Some(ch) = self.input[self.pos..].chars().next() {
            if ch.is_whitespace() || ch == '>' || ch == '/' {
                break;
            }
            self.pos += ch.len_utf8();
        }
        self.input[start..self.pos].to_string()
    }
}
