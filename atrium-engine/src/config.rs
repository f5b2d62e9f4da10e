//! Engine and per-application configuration.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use atrium_css::scoper::EngineQuirks;

use crate::lifecycle::AppFlags;

/// Plugin-supplied key declarations for one application (or all of them).
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    /// Keys that never fall back to the real global scope.
    pub scoped_keys: Vec<String>,
    /// Keys whose writes are mirrored to the real global scope.
    pub escape_keys: Vec<String>,
}

impl PluginConfig {
    /// Create an empty plugin configuration.
    pub fn new() -> Self {
        PluginConfig::default()
    }

    /// Add a scope-only key.
    pub fn scope_key(mut self, key: &str) -> Self {
        self.scoped_keys.push(key.to_string());
        self
    }

    /// Add an escaping key.
    pub fn escape_key(mut self, key: &str) -> Self {
        self.escape_keys.push(key.to_string());
        self
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Rendering-engine quirk flags forwarded to the style scoper.
    pub quirks: EngineQuirks,
    /// Plugin declarations applied to every application.
    pub global_plugin: PluginConfig,
    /// Plugin declarations keyed by application name.
    pub app_plugins: HashMap<String, PluginConfig>,
}

impl EngineConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        EngineConfig::default()
    }

    /// Register a per-application plugin.
    pub fn add_app_plugin(&mut self, app: &str, plugin: PluginConfig) {
        self.app_plugins.insert(app.to_string(), plugin);
    }

    /// Scope-only keys for an application: global first, then per-app.
    pub fn scoped_keys_for(&self, app: &str) -> Vec<String> {
        let mut keys = self.global_plugin.scoped_keys.clone();
        if let Some(plugin) = self.app_plugins.get(app) {
            keys.extend(plugin.scoped_keys.iter().cloned());
        }
        keys
    }

    /// Escaping keys for an application: global first, then per-app.
    pub fn escape_keys_for(&self, app: &str) -> Vec<String> {
        let mut keys = self.global_plugin.escape_keys.clone();
        if let Some(plugin) = self.app_plugins.get(app) {
            keys.extend(plugin.escape_keys.iter().cloned());
        }
        keys
    }
}

/// Options accepted when constructing an application instance. Opaque to
/// the lifecycle core; validated at the boundary.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Behavior flags.
    pub flags: AppFlags,
    /// Route prefix stamped into the sandbox at mount.
    pub base_route: Option<String>,
}

impl AppOptions {
    /// Default options: sandbox on, style scoping on.
    pub fn new() -> Self {
        AppOptions::default()
    }

    /// Set behavior flags.
    pub fn with_flags(mut self, flags: AppFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the route prefix.
    pub fn with_base_route(mut self, route: &str) -> Self {
        self.base_route = Some(route.to_string());
        self
    }
}
