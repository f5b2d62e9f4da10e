//! Lifecycle events.
//!
//! Outbound events are dispatched to handlers registered for the owning
//! application's container and mirrored to a global handler table.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use atrium_dom::node::NodeId;

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created,
    Beforemount,
    Mounted,
    Unmount,
    Error,
}

impl LifecycleEvent {
    /// Get event name.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Created => "created",
            LifecycleEvent::Beforemount => "beforemount",
            LifecycleEvent::Mounted => "mounted",
            LifecycleEvent::Unmount => "unmount",
            LifecycleEvent::Error => "error",
        }
    }
}

/// Event detail payload: the application name and its container, plus the
/// triggering error message for `error` events.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDetail {
    pub app_name: String,
    pub container: Option<NodeId>,
    pub message: Option<String>,
}

impl EventDetail {
    /// Create a detail payload.
    pub fn new(app_name: &str, container: Option<NodeId>) -> Self {
        EventDetail {
            app_name: app_name.to_string(),
            container,
            message: None,
        }
    }

    /// Attach an error message.
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// A lifecycle event handler.
pub type LifecycleHandler = Rc<dyn Fn(LifecycleEvent, &EventDetail)>;

/// Handle to one handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(pub u64);

/// Handler tables for lifecycle event dispatch.
#[derive(Default)]
pub struct EventHub {
    global: Vec<(HandlerId, LifecycleHandler)>,
    per_app: HashMap<String, Vec<(HandlerId, LifecycleHandler)>>,
    next_id: u64,
}

impl EventHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        EventHub::default()
    }

    /// Register a handler fired for every application's events.
    pub fn add_global_handler(&mut self, handler: LifecycleHandler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.global.push((id, handler));
        id
    }

    /// Register a handler fired only for one application's events.
    pub fn add_app_handler(&mut self, app: &str, handler: LifecycleHandler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.per_app.entry(app.to_string()).or_default().push((id, handler));
        id
    }

    /// Remove a handler by id. Unknown ids are a no-op.
    pub fn remove_handler(&mut self, id: HandlerId) {
        self.global.retain(|(hid, _)| *hid != id);
        for handlers in self.per_app.values_mut() {
            handlers.retain(|(hid, _)| *hid != id);
        }
    }

    /// Drop every handler registered for an application.
    pub fn clear_app_handlers(&mut self, app: &str) {
        self.per_app.remove(app);
    }

    /// Dispatch an event to the application's handlers, then the global
    /// table. Returns the number of handlers notified.
    pub fn dispatch(&self, event: LifecycleEvent, detail: &EventDetail) -> usize {
        log::debug!("[Atrium Events] {} -> {}", detail.app_name, event.name());
        let mut notified = 0;
        if let Some(handlers) = self.per_app.get(&detail.app_name) {
            for (_, handler) in handlers {
                handler(event, detail);
                notified += 1;
            }
        }
        for (_, handler) in &self.global {
            handler(event, detail);
            notified += 1;
        }
        notified
    }
}
