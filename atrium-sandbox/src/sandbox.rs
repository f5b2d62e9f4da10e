//! Execution Sandbox - composition, lifecycle, and UMD snapshot/restore.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use atrium_dom::patch::PatchContext;
use atrium_types::url::Url;

use crate::channel::{ChannelCallback, DataChannel};
use crate::effects::{EffectTracker, EventBus, Handler, ListenerId, TimerHost, TimerId};
use crate::scope::{RealScope, ResolveOutcome, ScopeStore, WriteOutcome};
use crate::value::Value;

/// Identity marker: the owning application's name.
pub const MARKER_NAME: &str = "__ATRIUM_NAME__";
/// Identity marker: the application's public path.
pub const MARKER_PUBLIC_PATH: &str = "__ATRIUM_PUBLIC_PATH__";
/// Identity marker: the base route stamped at start.
pub const MARKER_BASE_ROUTE: &str = "__ATRIUM_BASE_ROUTE__";
/// Escape hatch: reference to the real global scope.
pub const MARKER_RAW_SCOPE: &str = "rawWindow";
/// Escape hatch: reference to the real document.
pub const MARKER_RAW_DOCUMENT: &str = "rawDocument";

/// Side effects captured before an auto-executing bundle's first mount,
/// replayed on every later re-mount instead of re-running initialization.
pub struct EffectSnapshot {
    listeners: Vec<(String, Handler)>,
    timers: Vec<(u64, Handler)>,
    subscriptions: Vec<ChannelCallback>,
    injected: Vec<(String, Value)>,
}

/// The per-application execution sandbox.
pub struct Sandbox {
    app_name: String,
    active: bool,
    base_route: Option<String>,
    store: ScopeStore,
    tracker: EffectTracker,
    /// Host page to application messaging.
    pub host_channel: DataChannel,
    /// Application to host page messaging.
    pub app_channel: DataChannel,
    snapshot: Option<EffectSnapshot>,
}

impl Sandbox {
    /// Build a sandbox bound to a (name, url) pair. The isolated scope is
    /// pre-populated with identity markers and escape-hatch references.
    pub fn new(app_name: &str, url: &Url) -> Self {
        let mut store = ScopeStore::new();
        store.seed(MARKER_NAME, Value::string(app_name));
        store.seed(MARKER_PUBLIC_PATH, Value::string(&url.public_path()));
        store.seed(MARKER_RAW_SCOPE, Value::RealScopeRef);
        store.seed(MARKER_RAW_DOCUMENT, Value::RealDocumentRef);

        Sandbox {
            app_name: app_name.to_string(),
            active: false,
            base_route: None,
            store,
            tracker: EffectTracker::new(app_name),
            host_channel: DataChannel::new(),
            app_channel: DataChannel::new(),
            snapshot: None,
        }
    }

    /// The owning application's name.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Whether the sandbox is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Declare plugin-configured scope-only keys.
    pub fn declare_scoped(&mut self, keys: &[&str]) {
        self.store.declare_scoped(keys);
    }

    /// Declare plugin-configured escaping keys.
    pub fn declare_escaping(&mut self, keys: &[&str]) {
        self.store.declare_escaping(keys);
    }

    /// Activate the sandbox. Idempotent. The first activation process-wide
    /// installs the document interception through the patch context.
    pub fn start(&mut self, base_route: Option<&str>, ctx: &mut PatchContext) {
        if self.active {
            return;
        }
        self.active = true;
        self.base_route = base_route.map(|r| r.to_string());
        self.store.seed(
            MARKER_BASE_ROUTE,
            base_route.map(Value::string).unwrap_or(Value::Undefined),
        );
        ctx.acquire();
        log::debug!("[Atrium Sandbox] {} started", self.app_name);
    }

    /// Deactivate the sandbox: release tracked effects, clear messaging
    /// listeners, remove injected/escaped keys, and drop the document
    /// interception refcount. Idempotent.
    pub fn stop(
        &mut self,
        ctx: &mut PatchContext,
        real: &mut RealScope,
        bus: &mut EventBus,
        timers: &mut TimerHost,
    ) {
        if !self.active {
            return;
        }
        self.active = false;
        self.tracker.release_effects(bus, timers);
        self.host_channel.clear_listeners();
        self.app_channel.clear_listeners();
        self.store.clear(real);
        ctx.release();
        log::debug!("[Atrium Sandbox] {} stopped", self.app_name);
    }

    // Scope interception

    /// Read through the resolution order.
    pub fn resolve(&self, real: &RealScope, key: &str) -> ResolveOutcome {
        self.store.resolve(real, key)
    }

    /// Existence check.
    pub fn has(&self, real: &RealScope, key: &str) -> bool {
        self.store.has(real, key)
    }

    /// Write through the classification rules; inactive sandboxes drop
    /// writes.
    pub fn assign(&mut self, real: &mut RealScope, key: &str, value: Value) -> WriteOutcome {
        self.store.assign(real, key, value, self.active)
    }

    /// Delete a key from bookkeeping and whichever object holds it.
    pub fn delete(&mut self, real: &mut RealScope, key: &str) -> bool {
        self.store.delete(real, key)
    }

    /// Own keys of the isolated scope.
    pub fn own_keys(&self) -> Vec<String> {
        self.store.own_keys()
    }

    /// Direct read of an isolated-scope value.
    pub fn get_local(&self, key: &str) -> Option<&Value> {
        self.store.get_local(key)
    }

    /// Keys mirrored to the real scope.
    pub fn escaped_keys(&self) -> Vec<String> {
        self.store.escaped_keys()
    }

    // Effect tracking

    /// Register a listener; tracked and forwarded while active.
    pub fn add_listener(
        &mut self,
        bus: &mut EventBus,
        event: &str,
        handler: Handler,
    ) -> Option<ListenerId> {
        if !self.active {
            return None;
        }
        Some(self.tracker.add_listener(bus, event, handler))
    }

    /// Remove a tracked listener.
    pub fn remove_listener(&mut self, bus: &mut EventBus, event: &str, id: ListenerId) {
        if !self.active {
            return;
        }
        self.tracker.remove_listener(bus, event, id);
    }

    /// Schedule a timer; tracked and forwarded while active.
    pub fn set_timer(
        &mut self,
        host: &mut TimerHost,
        duration_ms: u64,
        handler: Handler,
    ) -> Option<TimerId> {
        if !self.active {
            return None;
        }
        Some(self.tracker.set_timer(host, duration_ms, handler))
    }

    /// Clear a tracked timer.
    pub fn clear_timer(&mut self, host: &mut TimerHost, id: TimerId) {
        if !self.active {
            return;
        }
        self.tracker.clear_timer(host, id);
    }

    /// Number of tracked listeners.
    pub fn listener_count(&self) -> usize {
        self.tracker.listener_count()
    }

    /// Number of tracked timers.
    pub fn timer_count(&self) -> usize {
        self.tracker.timer_count()
    }

    // UMD snapshot/restore

    /// Whether a snapshot was recorded.
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Capture current listeners, timers, messaging subscriptions and
    /// injected values. Called once, immediately before an auto-executing
    /// bundle's externally supplied mount hook first runs.
    pub fn record_snapshot(&mut self) {
        let snapshot = EffectSnapshot {
            listeners: self
                .tracker
                .listeners
                .iter()
                .map(|l| (l.event.clone(), l.handler.clone()))
                .collect(),
            timers: self
                .tracker
                .timers
                .iter()
                .map(|t| (t.duration_ms, t.handler.clone()))
                .collect(),
            subscriptions: self.host_channel.snapshot_subscriptions(),
            injected: self.store.injected_entries(),
        };
        log::debug!(
            "[Atrium Sandbox] {} snapshot: {} listeners, {} timers, {} injected",
            self.app_name,
            snapshot.listeners.len(),
            snapshot.timers.len(),
            snapshot.injected.len()
        );
        self.snapshot = Some(snapshot);
    }

    /// Replay the recorded snapshot through the normal write and tracking
    /// paths, producing the same observable side effects as the original
    /// mount without re-running the bundle's top-level code.
    pub fn rebuild_snapshot(
        &mut self,
        real: &mut RealScope,
        bus: &mut EventBus,
        timers: &mut TimerHost,
    ) {
        let snapshot = match self.snapshot.take() {
            Some(snapshot) => snapshot,
            None => return,
        };
        for (key, value) in &snapshot.injected {
            self.store.assign(real, key, value.clone(), self.active);
        }
        for (event, handler) in &snapshot.listeners {
            // Event names were qualified when first tracked; register them
            // verbatim rather than re-qualifying.
            let id = bus.add(event, handler.clone());
            self.tracker.listeners.push(crate::effects::TrackedListener {
                event: event.clone(),
                id,
                handler: handler.clone(),
            });
        }
        for (duration_ms, handler) in &snapshot.timers {
            self.tracker.set_timer(timers, *duration_ms, handler.clone());
        }
        for callback in &snapshot.subscriptions {
            self.host_channel.add_listener(callback.clone(), false);
        }
        self.snapshot = Some(snapshot);
    }
}
