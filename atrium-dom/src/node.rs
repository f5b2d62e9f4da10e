//! DOM Node - node records for the arena document tree

use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Index of a node within its document's arena.
pub type NodeId = usize;

/// An element or attribute name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: &str, value: &str) -> Self {
        Attribute {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementData {
    /// Lowercased tag name.
    pub tag: String,
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// The document root.
    Document,
    /// An element node.
    Element(ElementData),
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

/// A node in the arena document tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// This node's arena index.
    pub id: NodeId,
    /// Parent node, if attached.
    pub parent: Option<NodeId>,
    /// Child nodes in order.
    pub children: Vec<NodeId>,
    /// Node payload.
    pub data: NodeData,
    /// Identity of the application that created this node, stamped by the
    /// patch layer at creation time.
    pub owner_app: Option<String>,
}

impl Node {
    /// Create a detached node.
    pub fn new(id: NodeId, data: NodeData) -> Self {
        Node {
            id,
            parent: None,
            children: Vec::new(),
            data,
            owner_app: None,
        }
    }

    /// Check if this is an element node.
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Get the element payload, if this is an element.
    pub fn element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Get the element payload mutably, if this is an element.
    pub fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Get the tag name, if this is an element.
    pub fn tag_name(&self) -> Option<&str> {
        self.element().map(|e| e.tag.as_str())
    }

    /// Get an attribute value.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.element()?
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute value, replacing any existing one.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        if let Some(element) = self.element_mut() {
            if let Some(attr) = element.attributes.iter_mut().find(|a| a.name == name) {
                attr.value = value.to_string();
            } else {
                element.attributes.push(Attribute::new(name, value));
            }
        }
    }

    /// Remove an attribute.
    pub fn remove_attribute(&mut self, name: &str) {
        if let Some(element) = self.element_mut() {
            element.attributes.retain(|a| a.name != name);
        }
    }

    /// Whether the element has the given class.
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .map(|c| c.split_ascii_whitespace().any(|part| part == class))
            .unwrap_or(false)
    }

    /// Get the text payload, if this is a text node.
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }
}
