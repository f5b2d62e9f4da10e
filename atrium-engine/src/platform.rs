//! Shared platform snapshot.
//!
//! Captures the host page's baseline global-scope keys and the document's
//! structural roots once, before any application activates, so original
//! behavior is always recoverable.

use alloc::string::String;
use alloc::vec::Vec;

use atrium_dom::document::Document;
use atrium_dom::node::NodeId;
use atrium_sandbox::scope::RealScope;

/// Baseline state of the host page, taken before any patching.
#[derive(Debug, Clone)]
pub struct PlatformSnapshot {
    baseline_keys: Vec<String>,
    head: Option<NodeId>,
    body: Option<NodeId>,
}

impl PlatformSnapshot {
    /// Capture the real scope's key set and the document's head/body ids.
    pub fn capture(real: &RealScope, document: &Document) -> Self {
        let snapshot = PlatformSnapshot {
            baseline_keys: real.keys(),
            head: document.head(),
            body: document.body(),
        };
        log::debug!(
            "[Atrium Platform] Snapshot captured: {} baseline keys",
            snapshot.baseline_keys.len()
        );
        snapshot
    }

    /// Whether a key existed on the real scope at capture time.
    pub fn is_baseline(&self, key: &str) -> bool {
        self.baseline_keys.binary_search_by(|k| k.as_str().cmp(key)).is_ok()
    }

    /// The host document's head at capture time.
    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    /// The host document's body at capture time.
    pub fn body(&self) -> Option<NodeId> {
        self.body
    }

    /// Remove every non-baseline key from the real scope, returning the
    /// number removed.
    pub fn restore(&self, real: &mut RealScope) -> usize {
        let mut removed = 0;
        for key in real.keys() {
            if !self.is_baseline(&key) {
                real.delete(&key);
                removed += 1;
            }
        }
        if removed > 0 {
            log::debug!("[Atrium Platform] Restored real scope: {} keys removed", removed);
        }
        removed
    }
}
