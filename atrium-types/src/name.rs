//! Application naming.
//!
//! Every application instance is keyed by a unique name. Names end up in
//! element attributes and CSS selector prefixes, so the accepted alphabet
//! is restricted accordingly.

use alloc::format;
use alloc::string::{String, ToString};
use core::fmt;
use core::ops::Deref;

/// The custom element tag used as an application's rendering container.
pub const CONTAINER_TAG: &str = "atrium-app";

/// Name error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name was empty.
    Empty,
    /// The name did not start with an ASCII letter.
    BadStart(String),
    /// The name contained a character outside [A-Za-z0-9_-].
    BadChar(String, char),
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::Empty => write!(f, "Empty application name"),
            NameError::BadStart(n) => {
                write!(f, "Application name must start with a letter: {}", n)
            }
            NameError::BadChar(n, c) => {
                write!(f, "Invalid character '{}' in application name: {}", c, n)
            }
        }
    }
}

/// Validate an application name.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(NameError::Empty),
        Some(c) if !c.is_ascii_alphabetic() => {
            return Err(NameError::BadStart(name.to_string()))
        }
        Some(_) => {}
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(NameError::BadChar(name.to_string(), c));
        }
    }
    Ok(())
}

/// A validated application name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppName(String);

impl AppName {
    /// Create a validated application name.
    pub fn new(name: &str) -> Result<Self, NameError> {
        validate_name(name)?;
        Ok(AppName(name.to_string()))
    }

    /// Get the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for AppName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The selector prefix scoping a rule to one application's container,
/// e.g. `atrium-app[name=app1]`.
pub fn container_prefix(name: &str) -> String {
    format!("{}[name={}]", CONTAINER_TAG, name)
}
