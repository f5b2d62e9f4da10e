//! Atrium Engine - Application lifecycle engine
//!
//! The process-wide half of the Atrium micro-frontend engine: the global
//! application registry, the lifecycle state machine, the resource
//! extraction pipeline, lifecycle events, the deferred-task queue, and the
//! `Atrium` facade that owns all shared state. It's designed to work in
//! no_std environments.

#![no_std]
#![allow(dead_code)]

extern crate alloc;

pub mod config;
pub mod engine;
pub mod events;
pub mod lifecycle;
pub mod pipeline;
pub mod platform;
pub mod registry;
pub mod task;


pub use config::{AppOptions, EngineConfig, PluginConfig};
pub use engine::{Atrium, EngineError};
pub use events::{EventDetail, EventHub, HandlerId, LifecycleEvent, LifecycleHandler};
pub use lifecycle::{AppFlags, AppInstance, LifecycleState, PendingMount, UmdHooks};
pub use pipeline::{
    extract, ExecEnv, FetchError, FetchId, FetchKind, FetchRequest, Fetcher, NullExecutor,
    NullFetcher, PipelineError, ResourceCache, ResourceClass, ScriptError, ScriptExecutor,
    ScriptResource, SourceBundle, StyleResource,
};
pub use platform::PlatformSnapshot;
pub use registry::AppRegistry;
pub use task::{Task, TaskLane, TaskQueue};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppFlags, AppOptions, Atrium, EngineConfig, EngineError, EventDetail, FetchError,
        FetchRequest, LifecycleEvent, LifecycleState, PluginConfig, ResourceClass, UmdHooks,
    };
}
