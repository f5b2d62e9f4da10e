//! Effect tracking - listener and timer virtualization.
//!
//! The sandbox intercepts the isolated scope's listener/timer operations,
//! records every registration, and forwards the call to the real
//! underlying primitive so events and timers fire normally. Releasing
//! effects issues the matching real removal for every record, which is the
//! only guarantee that application effects do not outlive an unmount.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

/// An opaque callback invoked when a listener or timer fires.
pub type Handler = Rc<dyn Fn()>;

/// Handle to one real listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle to one real timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// The reserved lifecycle event name applications listen to for their own
/// teardown signal.
pub const UNMOUNT_EVENT: &str = "unmount";

/// The host page's real event listener registry.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<String, Vec<(ListenerId, Handler)>>,
    next_id: u64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Register a listener for an event name.
    pub fn add(&mut self, event: &str, handler: Handler) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a listener. Removing an unknown id is a no-op.
    pub fn remove(&mut self, event: &str, id: ListenerId) {
        if let Some(list) = self.listeners.get_mut(event) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                self.listeners.remove(event);
            }
        }
    }

    /// Dispatch an event, invoking every registered handler. Returns the
    /// number of handlers invoked.
    pub fn dispatch(&self, event: &str) -> usize {
        match self.listeners.get(event) {
            Some(list) => {
                for (_, handler) in list {
                    handler();
                }
                list.len()
            }
            None => 0,
        }
    }

    /// Number of live registrations for an event name.
    pub fn count(&self, event: &str) -> usize {
        self.listeners.get(event).map(|l| l.len()).unwrap_or(0)
    }

    /// Total live registrations.
    pub fn total(&self) -> usize {
        self.listeners.values().map(|l| l.len()).sum()
    }
}

/// The host page's real timer table.
#[derive(Default)]
pub struct TimerHost {
    timers: HashMap<TimerId, (u64, Handler)>,
    next_id: u64,
}

impl TimerHost {
    /// Create an empty timer host.
    pub fn new() -> Self {
        TimerHost::default()
    }

    /// Schedule a timer.
    pub fn set(&mut self, duration_ms: u64, handler: Handler) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(id, (duration_ms, handler));
        id
    }

    /// Clear a timer. Clearing an unknown id is a no-op.
    pub fn clear(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    /// Fire a due timer, removing it. Returns whether it existed.
    pub fn fire(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some((_, handler)) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

/// One tracked listener registration.
#[derive(Clone)]
pub(crate) struct TrackedListener {
    pub event: String,
    pub id: ListenerId,
    pub handler: Handler,
}

/// One tracked timer.
#[derive(Clone)]
pub(crate) struct TrackedTimer {
    pub id: TimerId,
    pub duration_ms: u64,
    pub handler: Handler,
}

/// Per-sandbox effect tracker.
#[derive(Default)]
pub struct EffectTracker {
    app_name: String,
    pub(crate) listeners: Vec<TrackedListener>,
    pub(crate) timers: Vec<TrackedTimer>,
}

impl EffectTracker {
    /// Create a tracker for the named application.
    pub fn new(app_name: &str) -> Self {
        EffectTracker {
            app_name: app_name.to_string(),
            listeners: Vec::new(),
            timers: Vec::new(),
        }
    }

    /// Qualify the reserved unmount event so a generic registration only
    /// fires for this application's own teardown signal.
    pub fn qualify_event(&self, event: &str) -> String {
        if event == UNMOUNT_EVENT {
            format!("{}-{}", UNMOUNT_EVENT, self.app_name)
        } else {
            event.to_string()
        }
    }

    /// Record and forward a listener registration.
    pub fn add_listener(&mut self, bus: &mut EventBus, event: &str, handler: Handler) -> ListenerId {
        let event = self.qualify_event(event);
        let id = bus.add(&event, handler.clone());
        self.listeners.push(TrackedListener {
            event,
            id,
            handler,
        });
        id
    }

    /// Record and forward a listener removal.
    pub fn remove_listener(&mut self, bus: &mut EventBus, event: &str, id: ListenerId) {
        let event = self.qualify_event(event);
        bus.remove(&event, id);
        self.listeners.retain(|l| l.id != id);
    }

    /// Record and forward a timer.
    pub fn set_timer(&mut self, host: &mut TimerHost, duration_ms: u64, handler: Handler) -> TimerId {
        let id = host.set(duration_ms, handler.clone());
        self.timers.push(TrackedTimer {
            id,
            duration_ms,
            handler,
        });
        id
    }

    /// Record and forward a timer clear.
    pub fn clear_timer(&mut self, host: &mut TimerHost, id: TimerId) {
        host.clear(id);
        self.timers.retain(|t| t.id != id);
    }

    /// Number of tracked listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of tracked timers.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Walk every tracked collection, issue the matching real removal or
    /// clear, then empty the collections. Idempotent.
    pub fn release_effects(&mut self, bus: &mut EventBus, host: &mut TimerHost) {
        for listener in self.listeners.drain(..) {
            bus.remove(&listener.event, listener.id);
        }
        for timer in self.timers.drain(..) {
            host.clear(timer.id);
        }
    }
}
