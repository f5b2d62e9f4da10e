//! Atrium Types - Fundamental types for the Atrium micro-frontend engine
//!
//! This crate provides URL handling and application naming shared by every
//! other Atrium crate. It's designed to work in no_std environments.

#![no_std]
#![allow(dead_code)]

extern crate alloc;

pub mod name;
pub mod url;

#[cfg(test)]
mod tests;

pub use name::{container_prefix, validate_name, AppName, NameError, CONTAINER_TAG};
pub use url::{Url, UrlError};

/// Prelude for common imports
pub mod prelude {
    pub use crate::name::{container_prefix, validate_name, AppName, NameError, CONTAINER_TAG};
    pub use crate::url::{Url, UrlError};
}
