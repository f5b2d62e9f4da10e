//! Scope store - explicit property interception.
//!
//! The browser's transparent get/set/has/delete trapping becomes an
//! explicit API: `resolve` applies the read resolution order, `assign`
//! applies the write classification, and all bookkeeping (injected,
//! shadowed, escaped keys) is observable state.

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::value::{Property, ThisBinding, Value};

/// Keys that always resolve to the sandbox's own façade.
pub const GLOBAL_ALIASES: &[&str] = &["window", "self", "globalThis"];

/// Reserved internal prefix: such keys never fall back to the real scope.
pub const RESERVED_PREFIX: &str = "__ATRIUM_";

/// Keys whose writes go straight through to the real global scope.
pub const WRITE_THROUGH_KEYS: &[&str] = &["location"];

/// Cross-bundler globals mirrored to the real scope when absent there.
pub const CROSS_BUNDLER_KEYS: &[&str] = &["System", "__cjsWrapper"];

/// The host page's real global scope.
///
/// Owned by the engine; every sandbox resolves against the same instance.
#[derive(Debug, Default)]
pub struct RealScope {
    properties: HashMap<String, Property>,
}

impl RealScope {
    /// Create an empty real scope.
    pub fn new() -> Self {
        RealScope::default()
    }

    /// Get a property's value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).map(|p| &p.value)
    }

    /// Get a property record.
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Whether the key exists.
    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Set a property, preserving an existing descriptor.
    pub fn set(&mut self, key: &str, value: Value) {
        match self.properties.get_mut(key) {
            Some(prop) => prop.value = value,
            None => {
                self.properties.insert(key.to_string(), Property::plain(value));
            }
        }
    }

    /// Define a property with an explicit descriptor.
    pub fn define(&mut self, key: &str, property: Property) {
        self.properties.insert(key.to_string(), property);
    }

    /// Delete a property. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.properties.remove(key).is_some()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.properties.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Outcome of a read through the resolution order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The key names the sandbox façade itself.
    Facade,
    /// Resolved from the isolated scope.
    Local(Value),
    /// Fell back to the real global scope (functions possibly rebound).
    Fallback(Value),
    /// Not found anywhere the key is allowed to look.
    Missing,
}

/// Outcome of a write through the classification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The sandbox is inactive; the write was dropped.
    Dropped,
    /// The key is on the write-through list; written to the real scope.
    WroteThrough,
    /// A writable real-scope property was shadowed locally, descriptor
    /// preserved.
    Shadowed,
    /// An existing local key was updated in place.
    Updated {
        /// The mirrored copy on the real scope was updated too.
        escaped: bool,
    },
    /// Plain-assigned to the isolated scope and recorded injected.
    Injected {
        /// The value was additionally mirrored to the real scope.
        escaped: bool,
    },
}

/// The isolated scope of one sandbox.
#[derive(Debug, Default)]
pub struct ScopeStore {
    /// The isolated global-scope object.
    local: HashMap<String, Property>,
    /// Keys newly introduced by the application.
    injected: BTreeSet<String>,
    /// Real-scope keys shadowed locally by application writes.
    shadowed: BTreeSet<String>,
    /// Keys intentionally mirrored to the real scope.
    escaped: BTreeSet<String>,
    /// Plugin-declared keys that never fall back to the real scope.
    scoped_keys: BTreeSet<String>,
    /// Plugin-declared keys whose writes also escape to the real scope.
    escape_keys: BTreeSet<String>,
}

impl ScopeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        ScopeStore::default()
    }

    /// Declare plugin-configured scope-only keys.
    pub fn declare_scoped(&mut self, keys: &[&str]) {
        for key in keys {
            self.scoped_keys.insert((*key).to_string());
        }
    }

    /// Declare plugin-configured escaping keys.
    pub fn declare_escaping(&mut self, keys: &[&str]) {
        for key in keys {
            self.escape_keys.insert((*key).to_string());
        }
    }

    /// Pre-populate a key without it counting as application-injected.
    pub fn seed(&mut self, key: &str, value: Value) {
        self.local.insert(key.to_string(), Property::plain(value));
    }

    /// Read a local value directly (no fallback, no façade rules).
    pub fn get_local(&self, key: &str) -> Option<&Value> {
        self.local.get(key).map(|p| &p.value)
    }

    /// Keys newly introduced by the application, sorted.
    pub fn injected_keys(&self) -> Vec<String> {
        self.injected.iter().cloned().collect()
    }

    /// Keys mirrored to the real scope, sorted.
    pub fn escaped_keys(&self) -> Vec<String> {
        self.escaped.iter().cloned().collect()
    }

    /// Whether the key may never fall back to the real scope.
    fn is_scope_only(&self, key: &str) -> bool {
        key.starts_with(RESERVED_PREFIX) || self.scoped_keys.contains(key)
    }

    /// Apply the read resolution order.
    pub fn resolve(&self, real: &RealScope, key: &str) -> ResolveOutcome {
        if GLOBAL_ALIASES.contains(&key) {
            return ResolveOutcome::Facade;
        }
        if let Some(prop) = self.local.get(key) {
            return ResolveOutcome::Local(prop.value.clone());
        }
        if self.is_scope_only(key) {
            return ResolveOutcome::Missing;
        }
        match real.get(key) {
            Some(value) => ResolveOutcome::Fallback(rebind_for_fallback(value)),
            None => ResolveOutcome::Missing,
        }
    }

    /// Apply the `in`-style existence check: local keys and real-scope
    /// fallback, except for scope-only keys which never consult the real
    /// scope.
    pub fn has(&self, real: &RealScope, key: &str) -> bool {
        if GLOBAL_ALIASES.contains(&key) || self.local.contains_key(key) {
            return true;
        }
        if self.is_scope_only(key) {
            return false;
        }
        real.has(key)
    }

    /// Apply the write classification. `active` is the owning sandbox's
    /// active flag; inactive sandboxes drop writes.
    pub fn assign(
        &mut self,
        real: &mut RealScope,
        key: &str,
        value: Value,
        active: bool,
    ) -> WriteOutcome {
        if !active {
            return WriteOutcome::Dropped;
        }

        if WRITE_THROUGH_KEYS.contains(&key) {
            real.set(key, value);
            return WriteOutcome::WroteThrough;
        }

        if let Some(prop) = self.local.get_mut(key) {
            prop.value = value.clone();
            let escaped = self.escaped.contains(key);
            if escaped {
                real.set(key, value);
            }
            return WriteOutcome::Updated { escaped };
        }

        if let Some(prop) = real.property(key) {
            if prop.writable {
                // Shadow locally, preserving the original descriptor.
                let mut shadow = prop.clone();
                shadow.value = value;
                self.local.insert(key.to_string(), shadow);
                self.shadowed.insert(key.to_string());
                return WriteOutcome::Shadowed;
            }
        }

        let escapes = self.escape_keys.contains(key)
            || (CROSS_BUNDLER_KEYS.contains(&key) && !real.has(key));
        if escapes {
            real.set(key, value.clone());
            self.escaped.insert(key.to_string());
        }

        self.local.insert(key.to_string(), Property::plain(value));
        self.injected.insert(key.to_string());
        WriteOutcome::Injected { escaped: escapes }
    }

    /// Delete a key from bookkeeping and from whichever object holds it.
    pub fn delete(&mut self, real: &mut RealScope, key: &str) -> bool {
        let mut existed = self.local.remove(key).is_some();
        self.injected.remove(key);
        self.shadowed.remove(key);
        if self.escaped.remove(key) {
            existed |= real.delete(key);
        }
        existed
    }

    /// All own keys of the isolated scope, sorted.
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.local.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Injected key/value pairs, for snapshot capture.
    pub fn injected_entries(&self) -> Vec<(String, Value)> {
        self.injected
            .iter()
            .filter_map(|key| self.local.get(key).map(|p| (key.clone(), p.value.clone())))
            .collect()
    }

    /// Remove every injected key locally and every escaped key from the
    /// real scope. Idempotent.
    pub fn clear(&mut self, real: &mut RealScope) {
        for key in core::mem::take(&mut self.injected) {
            self.local.remove(&key);
        }
        for key in core::mem::take(&mut self.shadowed) {
            self.local.remove(&key);
        }
        for key in core::mem::take(&mut self.escaped) {
            real.delete(&key);
        }
    }
}

/// Rebind a fallback-read function to the real scope, honoring its
/// capability tags. Non-functions pass through.
fn rebind_for_fallback(value: &Value) -> Value {
    match value {
        Value::Function(f) if f.rebind_on_fallback && !f.is_bound() => {
            let mut rebound = f.clone();
            rebound.this_binding = ThisBinding::RealScope;
            Value::Function(rebound)
        }
        other => other.clone(),
    }
}
