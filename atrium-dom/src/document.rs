//! DOM Document - arena tree and query methods
//!
//! Nodes live in a flat arena addressed by `NodeId`, with parent/child
//! links by index. Detached nodes stay in the arena; removal only unlinks.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::node::{Attribute, ElementData, Node, NodeData, NodeId};

/// DOM operation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// No node with this id.
    NoSuchNode(NodeId),
    /// The operation requires an element node.
    NotAnElement(NodeId),
    /// The node is not attached to a parent.
    NotAttached(NodeId),
    /// The reference node is not a child of the given parent.
    NotAChild(NodeId),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::NoSuchNode(id) => write!(f, "No such node: {}", id),
            DomError::NotAnElement(id) => write!(f, "Node {} is not an element", id),
            DomError::NotAttached(id) => write!(f, "Node {} is not attached", id),
            DomError::NotAChild(id) => write!(f, "Node {} is not a child of the parent", id),
        }
    }
}

/// An arena document tree.
#[derive(Debug, Clone)]
pub struct Document {
    /// All nodes in the document.
    nodes: Vec<Node>,
    /// The `<head>` node of a host document.
    head: Option<NodeId>,
    /// The `<body>` node of a host document.
    body: Option<NodeId>,
}

/// The document root is always node 0.
pub const DOCUMENT_NODE: NodeId = 0;

impl Document {
    /// Create a new empty document (root node only).
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            head: None,
            body: None,
        };
        doc.nodes.push(Node::new(DOCUMENT_NODE, NodeData::Document));
        doc
    }

    /// Create a host document with html/head/body structure.
    pub fn new_host() -> Self {
        let mut doc = Document::new();
        let html = doc.create_element("html", Vec::new());
        let head = doc.create_element("head", Vec::new());
        let body = doc.create_element("body", Vec::new());
        // Infallible: all ids were just created.
        let _ = doc.append(DOCUMENT_NODE, html);
        let _ = doc.append(html, head);
        let _ = doc.append(html, body);
        doc.head = Some(head);
        doc.body = Some(body);
        doc
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a mutable node by id.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// The `<head>` of a host document.
    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    /// The `<body>` of a host document.
    pub fn body(&self) -> Option<NodeId> {
        self.body
    }

    /// Record which node serves as the `<head>` region.
    pub fn set_head(&mut self, head: Option<NodeId>) {
        self.head = head;
    }

    /// Record which node serves as the `<body>` region.
    pub fn set_body(&mut self, body: Option<NodeId>) {
        self.body = body;
    }

    /// The `<html>` element, if present.
    pub fn document_element(&self) -> Option<NodeId> {
        self.nodes[DOCUMENT_NODE]
            .children
            .iter()
            .copied()
            .find(|&id| self.nodes[id].tag_name() == Some("html"))
    }

    /// Number of nodes in the arena (including detached ones).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the arena holds only the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str, attributes: Vec<Attribute>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(
            id,
            NodeData::Element(ElementData {
                tag: tag.to_ascii_lowercase(),
                attributes,
            }),
        ));
        id
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, NodeData::Text(text.to_string())));
        id
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes
            .push(Node::new(id, NodeData::Comment(text.to_string())));
        id
    }

    /// Append a child to a parent, detaching it from any previous parent.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check(parent)?;
        self.check(child)?;
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        Ok(())
    }

    /// Insert a child before a reference child of the parent.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let reference = match reference {
            Some(r) => r,
            None => return self.append(parent, child),
        };
        self.check(parent)?;
        self.check(child)?;
        let pos = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == reference)
            .ok_or(DomError::NotAChild(reference))?;
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.insert(pos, child);
        Ok(())
    }

    /// Replace an attached node with another node.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), DomError> {
        self.check(old)?;
        self.check(new)?;
        let parent = self.nodes[old].parent.ok_or(DomError::NotAttached(old))?;
        let pos = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == old)
            .ok_or(DomError::NotAChild(old))?;
        self.detach(new);
        self.nodes[parent].children[pos] = new;
        self.nodes[new].parent = Some(parent);
        self.nodes[old].parent = None;
        Ok(())
    }

    /// Remove (unlink) a node from its parent. The node stays in the arena.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.check(node)?;
        if self.nodes[node].parent.is_none() {
            return Err(DomError::NotAttached(node));
        }
        self.detach(node);
        Ok(())
    }

    /// Unlink all children of a node.
    pub fn clear_children(&mut self, parent: NodeId) {
        let children = core::mem::take(&mut self.nodes[parent].children);
        for child in children {
            self.nodes[child].parent = None;
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|&c| c != node);
        }
    }

    fn check(&self, id: NodeId) -> Result<(), DomError> {
        if id < self.nodes.len() {
            Ok(())
        } else {
            Err(DomError::NoSuchNode(id))
        }
    }

    /// Replace a node's text payload.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.check(node)?;
        match &mut self.nodes[node].data {
            NodeData::Text(t) | NodeData::Comment(t) => {
                *t = text.to_string();
                Ok(())
            }
            _ => Err(DomError::NotAnElement(node)),
        }
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node].data {
            NodeData::Text(text) => out.push_str(text),
            _ => {
                for &child in &self.nodes[node].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Deep-copy a subtree of another document into this one, returning the
    /// new root id. Every imported node is stamped with `owner`.
    pub fn import(
        &mut self,
        source: &Document,
        source_node: NodeId,
        parent: NodeId,
        owner: Option<&str>,
    ) -> Result<NodeId, DomError> {
        self.check(parent)?;
        let src = source.get(source_node).ok_or(DomError::NoSuchNode(source_node))?;
        let id = match &src.data {
            NodeData::Document => parent,
            NodeData::Element(data) => {
                let id = self.create_element(&data.tag, data.attributes.clone());
                self.nodes[id].owner_app = owner.map(|o| o.to_string());
                self.append(parent, id)?;
                id
            }
            NodeData::Text(text) => {
                let id = self.create_text(text);
                self.nodes[id].owner_app = owner.map(|o| o.to_string());
                self.append(parent, id)?;
                id
            }
            NodeData::Comment(text) => {
                let id = self.create_comment(text);
                self.nodes[id].owner_app = owner.map(|o| o.to_string());
                self.append(parent, id)?;
                id
            }
        };
        for &child in &src.children {
            self.import(source, child, id, owner)?;
        }
        Ok(id)
    }

    /// Find the first descendant of `scope` matching the selector.
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        self.query_selector_all(scope, selector).into_iter().next()
    }

    /// Find all descendants of `scope` matching the selector, in document
    /// order. Supports compound selectors (`tag`, `#id`, `.class`,
    /// `[attr=value]`, `*`) joined by descendant combinators.
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let compounds: Vec<Compound> = selector
            .split_ascii_whitespace()
            .map(Compound::parse)
            .collect();
        if compounds.is_empty() {
            return Vec::new();
        }
        let mut results = Vec::new();
        self.query_walk(scope, scope, &compounds, &mut results);
        results
    }

    fn query_walk(
        &self,
        scope: NodeId,
        node: NodeId,
        compounds: &[Compound],
        results: &mut Vec<NodeId>,
    ) {
        for &child in &self.nodes[node].children {
            if self.matches_within(scope, child, compounds) {
                results.push(child);
            }
            self.query_walk(scope, child, compounds, results);
        }
    }

    /// Match a node against a descendant chain, with all ancestor matches
    /// constrained to stay inside `scope`.
    fn matches_within(&self, scope: NodeId, node: NodeId, compounds: &[Compound]) -> bool {
        let (last, rest) = match compounds.split_last() {
            Some(split) => split,
            None => return false,
        };
        if !self.matches_compound(node, last) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }
        let mut current = self.nodes[node].parent;
        while let Some(ancestor) = current {
            if ancestor == scope {
                break;
            }
            if self.matches_within(scope, ancestor, rest) {
                return true;
            }
            current = self.nodes[ancestor].parent;
        }
        false
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let n = &self.nodes[node];
        if !n.is_element() {
            return false;
        }
        if let Some(tag) = &compound.tag {
            if n.tag_name() != Some(tag.as_str()) {
                return false;
            }
        }
        if let Some(id) = &compound.id {
            if n.get_attribute("id") != Some(id.as_str()) {
                return false;
            }
        }
        for class in &compound.classes {
            if !n.has_class(class) {
                return false;
            }
        }
        for (name, value) in &compound.attributes {
            match value {
                Some(v) => {
                    if n.get_attribute(name) != Some(v.as_str()) {
                        return false;
                    }
                }
                None => {
                    if n.get_attribute(name).is_none() {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Serialize a subtree back to markup (tests and diagnostics).
    pub fn serialize(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node].data {
            NodeData::Document => {
                for &child in &self.nodes[node].children {
                    self.write_node(child, out);
                }
            }
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(data) => {
                out.push('<');
                out.push_str(&data.tag);
                for attr in &data.attributes {
                    if attr.value.is_empty() {
                        out.push_str(&format!(" {}", attr.name));
                    } else {
                        out.push_str(&format!(" {}=\"{}\"", attr.name, attr.value));
                    }
                }
                out.push('>');
                for &child in &self.nodes[node].children {
                    self.write_node(child, out);
                }
                out.push_str(&format!("</{}>", data.tag));
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// One compound selector.
#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn parse(text: &str) -> Self {
        let mut compound = Compound::default();
        let mut rest = text;

        while !rest.is_empty() {
            let c = match rest.chars().next() {
                Some(c) => c,
                None => break,
            };
            match c {
                '*' => {
                    rest = &rest[1..];
                }
                '#' => {
                    let (name, tail) = take_ident(&rest[1..]);
                    compound.id = Some(name.to_string());
                    rest = tail;
                }
                '.' => {
                    let (name, tail) = take_ident(&rest[1..]);
                    compound.classes.push(name.to_string());
                    rest = tail;
                }
                '[' => {
                    let end = match rest.find(']') {
                        Some(end) => end,
                        None => break,
                    };
                    let body = &rest[1..end];
                    match body.split_once('=') {
                        Some((name, value)) => compound.attributes.push((
                            name.trim().to_string(),
                            Some(value.trim().trim_matches('"').to_string()),
                        )),
                        None => compound
                            .attributes
                            .push((body.trim().to_string(), None)),
                    }
                    rest = &rest[end + 1..];
                }
                _ => {
                    let (name, tail) = take_ident(rest);
                    if name.is_empty() {
                        break;
                    }
                    compound.tag = Some(name.to_ascii_lowercase());
                    rest = tail;
                }
            }
        }
        compound
    }
}

fn take_ident(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(text.len());
    (&text[..end], &text[end..])
}
