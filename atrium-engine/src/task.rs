//! Deferred lifecycle continuations.
//!
//! Post-mount events are deliberately deferred to the next task turn so
//! synchronous tree mutations from mount complete before listeners observe
//! them. Each task carries the state version it was scheduled under; the
//! drain skips tasks whose application has since transitioned.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::events::LifecycleEvent;

/// Which drain a task waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLane {
    /// Drained by `run_microtasks`, the default.
    Micro,
    /// Drained by `run_macrotasks`, for applications opting into
    /// macro-task deferral.
    Macro,
}

/// One scheduled event dispatch.
#[derive(Debug, Clone)]
pub struct Task {
    /// Owning application.
    pub app: String,
    /// State version at schedule time; dispatch is skipped on mismatch.
    pub version: u64,
    /// The event to dispatch.
    pub event: LifecycleEvent,
}

/// Two-lane continuation queue.
#[derive(Default)]
pub struct TaskQueue {
    micro: Vec<Task>,
    macro_lane: Vec<Task>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        TaskQueue::default()
    }

    /// Schedule a deferred event dispatch.
    pub fn schedule(&mut self, lane: TaskLane, app: &str, version: u64, event: LifecycleEvent) {
        let task = Task {
            app: app.to_string(),
            version,
            event,
        };
        match lane {
            TaskLane::Micro => self.micro.push(task),
            TaskLane::Macro => self.macro_lane.push(task),
        }
    }

    /// Take every task waiting in a lane, in schedule order.
    pub fn drain(&mut self, lane: TaskLane) -> Vec<Task> {
        match lane {
            TaskLane::Micro => core::mem::take(&mut self.micro),
            TaskLane::Macro => core::mem::take(&mut self.macro_lane),
        }
    }

    /// Number of tasks waiting in a lane.
    pub fn pending(&self, lane: TaskLane) -> usize {
        match lane {
            TaskLane::Micro => self.micro.len(),
            TaskLane::Macro => self.macro_lane.len(),
        }
    }
}
