//! Data channel - private messaging between host page and application.
//!
//! Each application has a host-to-app channel and an app-to-host channel;
//! the engine additionally owns a global broadcast channel visible to both
//! sides.

use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::value::Value;

/// A data listener callback.
pub type ChannelCallback = Rc<dyn Fn(&Value)>;

/// Handle to one channel subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackId(pub u64);

struct Subscription {
    id: CallbackId,
    callback: ChannelCallback,
}

/// One direction of the private messaging channel.
#[derive(Default)]
pub struct DataChannel {
    subscriptions: Vec<Subscription>,
    data: Option<Value>,
    next_id: u64,
}

impl DataChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        DataChannel::default()
    }

    /// Register a listener. With `auto_trigger`, the listener fires
    /// immediately when data was already dispatched.
    pub fn add_listener(&mut self, callback: ChannelCallback, auto_trigger: bool) -> CallbackId {
        self.next_id += 1;
        let id = CallbackId(self.next_id);
        if auto_trigger {
            if let Some(data) = &self.data {
                callback(data);
            }
        }
        self.subscriptions.push(Subscription { id, callback });
        id
    }

    /// Remove a listener. Unknown ids are a no-op.
    pub fn remove_listener(&mut self, id: CallbackId) {
        self.subscriptions.retain(|s| s.id != id);
    }

    /// Dispatch data to every listener and cache it for `get_data` and
    /// auto-triggered late subscribers.
    pub fn dispatch(&mut self, data: Value) {
        for sub in &self.subscriptions {
            (sub.callback)(&data);
        }
        self.data = Some(data);
    }

    /// The most recently dispatched data.
    pub fn get_data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Drop all subscriptions, keeping cached data.
    pub fn clear_listeners(&mut self) {
        self.subscriptions.clear();
    }

    /// Drop cached data and subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.data = None;
    }

    /// Snapshot the current subscriptions, for UMD rebuild.
    pub(crate) fn snapshot_subscriptions(&self) -> Vec<ChannelCallback> {
        self.subscriptions.iter().map(|s| s.callback.clone()).collect()
    }
}
