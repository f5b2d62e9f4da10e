//! Application lifecycle state machine.
//!
//! One `AppInstance` per running application: it exclusively owns its
//! sandbox and its container reference, while the registry holds only a
//! name-keyed lookup. Transition sequencing lives in the engine facade;
//! this module holds the state, flags, and transition bookkeeping.

use alloc::rc::Rc;
use alloc::string::{String, ToString};

use bitflags::bitflags;

use atrium_dom::document::Document;
use atrium_dom::node::NodeId;
use atrium_dom::patch::ContainerHandle;
use atrium_sandbox::sandbox::Sandbox;
use atrium_types::url::Url;

use crate::pipeline::{ResourceClass, SourceBundle};

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotLoaded,
    LoadingSource,
    LoadFinished,
    LoadError,
    Mounting,
    Mounted,
    /// State-preserving suspension entered from `Mounted` instead of
    /// `Unmount`; transitions directly to `Unmount`.
    KeepAliveHidden,
    Unmount,
}

impl LifecycleState {
    /// Get state name.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::NotLoaded => "NOT_LOADED",
            LifecycleState::LoadingSource => "LOADING_SOURCE",
            LifecycleState::LoadFinished => "LOAD_FINISHED",
            LifecycleState::LoadError => "LOAD_ERROR",
            LifecycleState::Mounting => "MOUNTING",
            LifecycleState::Mounted => "MOUNTED",
            LifecycleState::KeepAliveHidden => "KEEP_ALIVE_HIDDEN",
            LifecycleState::Unmount => "UNMOUNT",
        }
    }
}

bitflags! {
    /// Per-application behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AppFlags: u16 {
        /// Run without an execution sandbox.
        const DISABLE_SANDBOX = 1 << 0;
        /// Skip style scoping.
        const DISABLE_SCOPING = 1 << 1;
        /// Execute inline scripts in place.
        const INLINE = 1 << 2;
        /// Soft-unmount suspends instead of tearing down.
        const KEEP_ALIVE = 1 << 3;
        /// Load-only instance; completion parks at LOAD_FINISHED.
        const PREFETCH = 1 << 4;
        /// Auto-executing bundle with external mount/unmount hooks.
        /// Detected, not configured.
        const UMD = 1 << 5;
        /// Defer post-mount events to the macro-task lane.
        const MACRO_TASK = 1 << 6;
    }
}

/// External mount/unmount hooks registered by an auto-executing bundle.
#[derive(Clone)]
pub struct UmdHooks {
    pub mount: Rc<dyn Fn() -> Result<(), String>>,
    pub unmount: Rc<dyn Fn() -> Result<(), String>>,
}

/// Mount parameters parked before loading finishes.
#[derive(Debug, Clone)]
pub struct PendingMount {
    pub container: NodeId,
    pub base_route: Option<String>,
}

/// One isolated running copy of a loaded application.
pub struct AppInstance {
    name: String,
    url: Url,
    state: LifecycleState,
    /// Bumped on every transition; deferred tasks carry the version they
    /// were scheduled under and are skipped on mismatch.
    version: u64,
    /// Registry generation, assigned at insertion. Distinguishes this
    /// instance from a destroyed predecessor of the same name so the
    /// predecessor's in-flight fetches cannot complete into it.
    pub generation: u64,
    pub flags: AppFlags,
    pub base_route: Option<String>,
    /// Exclusively owned container regions; `None` while unmounted.
    pub container: Option<ContainerHandle>,
    pub pending_mount: Option<PendingMount>,
    /// Parsed markup with extraction placeholders.
    pub fragment: Option<Document>,
    pub bundle: SourceBundle,
    pub sandbox: Option<Sandbox>,
    pub hooks: Option<UmdHooks>,
    styles_loaded: bool,
    scripts_loaded: bool,
}

impl AppInstance {
    /// Create an instance in `NOT_LOADED`.
    pub fn new(name: &str, url: Url, flags: AppFlags) -> Self {
        let sandbox = if flags.contains(AppFlags::DISABLE_SANDBOX) {
            None
        } else {
            Some(Sandbox::new(name, &url))
        };
        AppInstance {
            name: name.to_string(),
            url,
            state: LifecycleState::NotLoaded,
            version: 0,
            generation: 0,
            flags,
            base_route: None,
            container: None,
            pending_mount: None,
            fragment: None,
            bundle: SourceBundle::default(),
            sandbox,
            hooks: None,
            styles_loaded: false,
            scripts_loaded: false,
        }
    }

    /// The application's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Current state version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Transition to a new state, bumping the version.
    pub fn transition(&mut self, to: LifecycleState) {
        log::debug!(
            "[Atrium Lifecycle] {}: {} -> {}",
            self.name,
            self.state.name(),
            to.name()
        );
        self.state = to;
        self.version += 1;
    }

    /// Whether the application is mounted and visible.
    pub fn is_mounted(&self) -> bool {
        self.state == LifecycleState::Mounted
    }

    /// Whether the application is suspended keep-alive.
    pub fn is_hidden(&self) -> bool {
        self.state == LifecycleState::KeepAliveHidden
    }

    /// Whether both resource classes have reported completion.
    pub fn load_complete(&self) -> bool {
        self.styles_loaded && self.scripts_loaded
    }

    /// Record one resource class as fully loaded. Returns true when this
    /// call completed the load.
    pub fn mark_class_loaded(&mut self, class: ResourceClass) -> bool {
        let already = self.load_complete();
        match class {
            ResourceClass::Style => self.styles_loaded = true,
            ResourceClass::Script => self.scripts_loaded = true,
        }
        !already && self.load_complete()
    }
}
