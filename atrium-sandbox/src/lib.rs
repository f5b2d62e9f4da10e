//! Atrium Sandbox - Per-application execution sandbox
//!
//! Gives application code the illusion of owning the global execution
//! context while keeping contexts isolated from each other and from the
//! host page. Property interception is modeled as an explicit
//! resolve/assign API over an isolated scope store, with effect tracking
//! and snapshot/restore for auto-executing bundles. It's designed to work
//! in no_std environments.

#![no_std]
#![allow(dead_code)]

extern crate alloc;

pub mod channel;
pub mod effects;
pub mod sandbox;
pub mod scope;
pub mod value;

#[cfg(test)]
mod tests;

pub use channel::{CallbackId, ChannelCallback, DataChannel};
pub use effects::{EffectTracker, EventBus, Handler, ListenerId, TimerHost, TimerId};
pub use sandbox::{EffectSnapshot, Sandbox};
pub use scope::{RealScope, ResolveOutcome, ScopeStore, WriteOutcome};
pub use value::{FunctionValue, Property, ThisBinding, Value};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CallbackId, ChannelCallback, DataChannel, EffectSnapshot, EffectTracker, EventBus,
        FunctionValue, Handler, ListenerId, Property, RealScope, ResolveOutcome, Sandbox,
        ScopeStore, ThisBinding, TimerHost, TimerId, Value, WriteOutcome,
    };
}
