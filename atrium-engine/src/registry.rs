//! Global application registry.
//!
//! One process-wide mapping from application name to instance. At most one
//! live entry per name; unmounted and hidden entries persist for reuse and
//! are removed only on explicit destroy.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::lifecycle::AppInstance;

/// Name-keyed application instance table.
#[derive(Default)]
pub struct AppRegistry {
    apps: HashMap<String, AppInstance>,
}

impl AppRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        AppRegistry::default()
    }

    /// Insert an instance under its name, replacing any previous entry.
    pub fn insert(&mut self, app: AppInstance) {
        self.apps.insert(app.name().to_string(), app);
    }

    /// Look up an instance.
    pub fn get(&self, name: &str) -> Option<&AppInstance> {
        self.apps.get(name)
    }

    /// Look up an instance mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut AppInstance> {
        self.apps.get_mut(name)
    }

    /// Whether an instance exists under this name.
    pub fn contains(&self, name: &str) -> bool {
        self.apps.contains_key(name)
    }

    /// Remove an instance, returning it.
    pub fn remove(&mut self, name: &str) -> Option<AppInstance> {
        self.apps.remove(name)
    }

    /// Number of registered instances.
    pub fn count(&self) -> usize {
        self.apps.len()
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.apps.keys().cloned().collect();
        names.sort();
        names
    }
}
