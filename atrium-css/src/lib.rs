//! Atrium CSS - Stylesheet parsing and style scoping
//!
//! This crate parses application stylesheets into a rule list and rewrites
//! selectors so they only match inside one application's rendering
//! container. It's designed to work in no_std environments.

#![no_std]
#![allow(dead_code)]

extern crate alloc;

pub mod parser;
pub mod scoper;
pub mod stylesheet;

#[cfg(test)]
mod tests;

pub use parser::{CssParser, ParseError};
pub use scoper::{EngineQuirks, PendingScope, ScratchSheet, StyleScoper};
pub use stylesheet::{ContainerRule, Rule, ScopeHint, StyleRule, Stylesheet};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ContainerRule, CssParser, EngineQuirks, ParseError, PendingScope, Rule, ScopeHint,
        ScratchSheet, StyleRule, StyleScoper, Stylesheet,
    };
}
