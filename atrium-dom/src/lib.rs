//! Atrium DOM - Document tree and patch layer
//!
//! An arena document tree standing in for the host page's DOM, a small
//! markup parser for application sources, and the patch layer that
//! redirects tree mutations and queries into the current application's
//! private container. It's designed to work in no_std environments.

#![no_std]
#![allow(dead_code)]

extern crate alloc;

pub mod document;
pub mod markup;
pub mod node;
pub mod patch;

#[cfg(test)]
mod tests;

pub use document::{Document, DomError};
pub use markup::{parse_fragment, MarkupError};
pub use node::{Attribute, ElementData, Node, NodeData, NodeId};
pub use patch::{AttrOutcome, ContainerHandle, PatchContext};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        parse_fragment, AttrOutcome, Attribute, ContainerHandle, Document, DomError, ElementData,
        MarkupError, Node, NodeData, NodeId, PatchContext,
    };
}
