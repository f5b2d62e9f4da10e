//! Engine facade.
//!
//! `Atrium` owns every piece of process-wide state: the registry, the real
//! global scope, the host document, the patch context, the event bus and
//! timer host, the resource caches, and the deferred-task queue. All
//! lifecycle sequencing runs through it; nothing here panics across the
//! public boundary.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use atrium_css::scoper::{ScratchSheet, StyleScoper};
use atrium_dom::document::{Document, DomError};
use atrium_dom::markup::parse_fragment;
use atrium_dom::node::{Attribute, NodeId};
use atrium_dom::patch::{AttrOutcome, ContainerHandle, PatchContext};
use atrium_sandbox::channel::{CallbackId, ChannelCallback, DataChannel};
use atrium_sandbox::effects::{EventBus, TimerHost};
use atrium_sandbox::scope::RealScope;
use atrium_sandbox::value::Value;
use atrium_types::name::{validate_name, NameError, CONTAINER_TAG};
use atrium_types::url::{Url, UrlError};

use crate::config::{AppOptions, EngineConfig};
use crate::events::{EventDetail, EventHub, HandlerId, LifecycleEvent, LifecycleHandler};
use crate::lifecycle::{AppFlags, AppInstance, LifecycleState, PendingMount, UmdHooks};
use crate::pipeline::{
    extract, ExecEnv, FetchError, FetchId, FetchKind, FetchRequest, Fetcher, NullExecutor,
    NullFetcher, ResourceCache, ResourceClass, ScriptExecutor,
};
use crate::platform::PlatformSnapshot;
use crate::registry::AppRegistry;
use crate::task::{TaskLane, TaskQueue};

/// Engine error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Invalid application name.
    InvalidName(NameError),
    /// Invalid application URL.
    InvalidUrl(UrlError),
    /// A live instance with the same name but a different URL exists.
    NameConflict(String),
    /// No instance registered under this name.
    UnknownApp(String),
    /// Tree operation failure.
    Dom(DomError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidName(e) => write!(f, "invalid application name: {}", e),
            EngineError::InvalidUrl(e) => write!(f, "invalid application url: {}", e),
            EngineError::NameConflict(name) => {
                write!(f, "application {} already registered with a different url", name)
            }
            EngineError::UnknownApp(name) => write!(f, "unknown application {}", name),
            EngineError::Dom(e) => write!(f, "dom error: {}", e),
        }
    }
}

impl From<DomError> for EngineError {
    fn from(e: DomError) -> Self {
        EngineError::Dom(e)
    }
}

/// The micro-frontend engine.
pub struct Atrium {
    config: EngineConfig,
    registry: AppRegistry,
    real_scope: RealScope,
    document: Document,
    patch: PatchContext,
    bus: EventBus,
    timers: TimerHost,
    cache: ResourceCache,
    queue: TaskQueue,
    scratch: ScratchSheet,
    platform: PlatformSnapshot,
    events: EventHub,
    global_channel: DataChannel,
    pending: HashMap<FetchId, FetchRequest>,
    next_fetch_id: u64,
    next_generation: u64,
    fetcher: Box<dyn Fetcher>,
    executor: Box<dyn ScriptExecutor>,
}

impl Atrium {
    /// Create an engine with a default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let real_scope = RealScope::new();
        let document = Document::new_host();
        let platform = PlatformSnapshot::capture(&real_scope, &document);
        Atrium {
            config,
            registry: AppRegistry::new(),
            real_scope,
            document,
            patch: PatchContext::new(),
            bus: EventBus::new(),
            timers: TimerHost::new(),
            cache: ResourceCache::new(),
            queue: TaskQueue::new(),
            scratch: ScratchSheet::new(),
            platform,
            events: EventHub::new(),
            global_channel: DataChannel::new(),
            pending: HashMap::new(),
            next_fetch_id: 0,
            next_generation: 0,
            fetcher: Box::new(NullFetcher),
            executor: Box::new(NullExecutor),
        }
    }

    /// Install a custom fetch transport.
    pub fn set_fetcher(&mut self, fetcher: Box<dyn Fetcher>) {
        self.fetcher = fetcher;
    }

    /// Install a custom script execution backend.
    pub fn set_executor(&mut self, executor: Box<dyn ScriptExecutor>) {
        self.executor = executor;
    }

    /// The host document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The host document, mutably.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// The real global scope.
    pub fn real_scope(&self) -> &RealScope {
        &self.real_scope
    }

    /// The real global scope, mutably.
    pub fn real_scope_mut(&mut self) -> &mut RealScope {
        &mut self.real_scope
    }

    /// The patch context.
    pub fn patch(&self) -> &PatchContext {
        &self.patch
    }

    /// The real event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The real event bus, mutably.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// The real timer host.
    pub fn timers(&self) -> &TimerHost {
        &self.timers
    }

    /// The registered application instances.
    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// The baseline platform snapshot.
    pub fn platform(&self) -> &PlatformSnapshot {
        &self.platform
    }

    /// Remove every non-baseline key from the real scope.
    pub fn restore_platform(&mut self) -> usize {
        self.platform.restore(&mut self.real_scope)
    }

    /// An application's lifecycle state.
    pub fn state_of(&self, name: &str) -> Option<LifecycleState> {
        self.registry.get(name).map(|a| a.state())
    }

    /// An application's container root, if mounted.
    pub fn container_of(&self, name: &str) -> Option<NodeId> {
        self.registry.get(name).and_then(|a| a.container.map(|h| h.container))
    }

    /// Register a handler fired for every application's lifecycle events.
    pub fn on_lifecycle(&mut self, handler: LifecycleHandler) -> HandlerId {
        self.events.add_global_handler(handler)
    }

    /// Register a handler fired for one application's lifecycle events.
    pub fn on_app_lifecycle(&mut self, app: &str, handler: LifecycleHandler) -> HandlerId {
        self.events.add_app_handler(app, handler)
    }

    /// Create an `atrium-app` container element attached to the host body.
    pub fn create_container(&mut self, name: &str) -> Result<NodeId, EngineError> {
        let container = self
            .document
            .create_element(CONTAINER_TAG, vec![Attribute::new("name", name)]);
        if let Some(body) = self.document.body() {
            self.document.append(body, container)?;
        }
        Ok(container)
    }

    /// Register an application and begin loading its source.
    ///
    /// Re-constructing an existing instance with the same URL reuses it and
    /// fires `created` again; a different URL is a logged conflict no-op.
    pub fn construct(&mut self, name: &str, url: &str, options: AppOptions) -> Result<(), EngineError> {
        if let Err(e) = validate_name(name) {
            log::warn!("[Atrium Registry] Rejected name {:?}: {}", name, e);
            return Err(EngineError::InvalidName(e));
        }
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("[Atrium Registry] Rejected url {:?}: {}", url, e);
                return Err(EngineError::InvalidUrl(e));
            }
        };

        if let Some(existing) = self.registry.get_mut(name) {
            if existing.url() != &url {
                log::warn!(
                    "[Atrium Registry] {} already registered with {}; ignoring {}",
                    name,
                    existing.url(),
                    url
                );
                return Err(EngineError::NameConflict(name.to_string()));
            }
            existing.flags.remove(AppFlags::PREFETCH);
            existing.flags |= options.flags;
            if options.base_route.is_some() {
                existing.base_route = options.base_route;
            }
            let container = existing.container.map(|h| h.container);
            self.events
                .dispatch(LifecycleEvent::Created, &EventDetail::new(name, container));
            return Ok(());
        }

        let mut app = AppInstance::new(name, url, options.flags);
        self.next_generation += 1;
        app.generation = self.next_generation;
        app.base_route = options.base_route;
        if let Some(sandbox) = app.sandbox.as_mut() {
            let scoped = self.config.scoped_keys_for(name);
            let scoped: Vec<&str> = scoped.iter().map(|k| k.as_str()).collect();
            sandbox.declare_scoped(&scoped);
            let escaping = self.config.escape_keys_for(name);
            let escaping: Vec<&str> = escaping.iter().map(|k| k.as_str()).collect();
            sandbox.declare_escaping(&escaping);
        }
        self.registry.insert(app);
        self.events
            .dispatch(LifecycleEvent::Created, &EventDetail::new(name, None));
        self.begin_load(name);
        Ok(())
    }

    /// Register a load-only instance; completion parks at `LOAD_FINISHED`.
    pub fn prefetch(&mut self, name: &str, url: &str) -> Result<(), EngineError> {
        self.construct(name, url, AppOptions::new().with_flags(AppFlags::PREFETCH))
    }

    fn begin_load(&mut self, name: &str) {
        let url = match self.registry.get_mut(name) {
            Some(app) => {
                app.transition(LifecycleState::LoadingSource);
                app.url().clone()
            }
            None => return,
        };
        self.issue_fetch(name, FetchKind::Markup, url);
    }

    fn issue_fetch(&mut self, app: &str, kind: FetchKind, url: Url) {
        let generation = match self.registry.get(app) {
            Some(instance) => instance.generation,
            None => return,
        };
        self.next_fetch_id += 1;
        let request = FetchRequest {
            id: FetchId(self.next_fetch_id),
            app: app.to_string(),
            generation,
            kind,
            url,
        };
        self.fetcher.fetch(&request);
        self.pending.insert(request.id, request);
    }

    /// In-flight fetches, in issue order.
    pub fn pending_requests(&self) -> Vec<FetchRequest> {
        let mut requests: Vec<FetchRequest> = self.pending.values().cloned().collect();
        requests.sort_by_key(|r| r.id.0);
        requests
    }

    /// Report completion of an in-flight fetch. Results for destroyed
    /// applications and unknown ids are discarded.
    pub fn complete_fetch(&mut self, id: FetchId, result: Result<String, FetchError>) {
        let Some(request) = self.pending.remove(&id) else {
            log::debug!("[Atrium Pipeline] Completion for unknown fetch {:?} discarded", id);
            return;
        };
        let live = self
            .registry
            .get(&request.app)
            .map(|app| app.generation == request.generation)
            .unwrap_or(false);
        if !live {
            log::debug!(
                "[Atrium Pipeline] Result for destroyed application {} discarded",
                request.app
            );
            return;
        }
        match (request.kind.clone(), result) {
            (FetchKind::Markup, Ok(text)) => self.on_markup(&request.app, &text),
            (FetchKind::Markup, Err(e)) => {
                self.on_load_error(&request.app, &format!("markup fetch failed: {}", e));
            }
            (FetchKind::Resource(class, index), Ok(text)) => {
                self.on_resource(&request.app, class, index, &request.url, &text);
            }
            (FetchKind::Resource(class, _), Err(e)) => {
                self.on_load_error(&request.app, &format!("{} fetch failed: {}", class.name(), e));
            }
        }
    }

    fn on_markup(&mut self, name: &str, text: &str) {
        let base = match self.registry.get(name) {
            Some(app) => app.url().clone(),
            None => return,
        };
        let mut fragment = match parse_fragment(text) {
            Ok(fragment) => fragment,
            Err(e) => {
                self.on_load_error(name, &format!("{}", e));
                return;
            }
        };
        let mut bundle = match extract(&mut fragment, &base) {
            Ok(bundle) => bundle,
            Err(e) => {
                self.on_load_error(name, &format!("{}", e));
                return;
            }
        };

        // Shareable resources hit the global cache before the network.
        for record in bundle.styles.iter_mut() {
            if record.code.is_none() && record.global {
                if let Some(url) = &record.url {
                    if let Some(code) = self.cache.get(ResourceClass::Style, url) {
                        record.code = Some(code.clone());
                    }
                }
            }
        }
        for record in bundle.scripts.iter_mut() {
            if record.code.is_none() && record.global {
                if let Some(url) = &record.url {
                    if let Some(code) = self.cache.get(ResourceClass::Script, url) {
                        record.code = Some(code.clone());
                    }
                }
            }
        }

        let style_fetches: Vec<(usize, Url)> = bundle
            .styles
            .iter()
            .enumerate()
            .filter_map(|(i, r)| if r.code.is_none() { r.url.clone().map(|u| (i, u)) } else { None })
            .collect();
        let script_fetches: Vec<(usize, Url)> = bundle
            .scripts
            .iter()
            .enumerate()
            .filter_map(|(i, r)| if r.code.is_none() { r.url.clone().map(|u| (i, u)) } else { None })
            .collect();

        let Some(app) = self.registry.get_mut(name) else { return };
        app.fragment = Some(fragment);
        app.bundle = bundle;

        for (index, url) in style_fetches {
            self.issue_fetch(name, FetchKind::Resource(ResourceClass::Style, index), url);
        }
        for (index, url) in script_fetches {
            self.issue_fetch(name, FetchKind::Resource(ResourceClass::Script, index), url);
        }

        for class in [ResourceClass::Style, ResourceClass::Script] {
            let complete = self
                .registry
                .get(name)
                .map(|a| a.bundle.class_complete(class))
                .unwrap_or(false);
            if complete {
                self.on_resource_loaded(name, class);
            }
        }
    }

    fn on_resource(&mut self, name: &str, class: ResourceClass, index: usize, url: &Url, text: &str) {
        let Some(app) = self.registry.get_mut(name) else { return };
        if !app.bundle.fill(class, index, text.to_string()) {
            log::warn!(
                "[Atrium Pipeline] {}: no {} record at index {}",
                name,
                class.name(),
                index
            );
            return;
        }
        let global = match class {
            ResourceClass::Style => app.bundle.styles.get(index).map(|r| r.global),
            ResourceClass::Script => app.bundle.scripts.get(index).map(|r| r.global),
        }
        .unwrap_or(false);
        let complete = app.bundle.class_complete(class);
        if global {
            self.cache.insert(class, url, text);
        }
        if complete {
            self.on_resource_loaded(name, class);
        }
    }

    /// Single-fire-per-class completion. Both classes finish the load;
    /// auto-mount runs only when a mount request is already parked and the
    /// instance is not prefetch-only.
    fn on_resource_loaded(&mut self, name: &str, class: ResourceClass) {
        let Some(app) = self.registry.get_mut(name) else { return };
        if !app.mark_class_loaded(class) {
            return;
        }
        match app.state() {
            LifecycleState::LoadingSource | LifecycleState::NotLoaded | LifecycleState::Unmount => {
                app.transition(LifecycleState::LoadFinished);
            }
            _ => {}
        }
        let should_mount =
            !app.flags.contains(AppFlags::PREFETCH) && app.pending_mount.is_some();
        if should_mount {
            if let Err(e) = self.do_mount(name) {
                log::error!("[Atrium Lifecycle] {} auto-mount failed: {}", name, e);
            }
        }
    }

    fn on_load_error(&mut self, name: &str, message: &str) {
        let Some(app) = self.registry.get_mut(name) else { return };
        if app.state() == LifecycleState::Unmount {
            log::debug!("[Atrium Lifecycle] {}: load error after unmount discarded", name);
            return;
        }
        app.transition(LifecycleState::LoadError);
        let container = app.container.map(|h| h.container);
        log::error!("[Atrium Lifecycle] {} load error: {}", name, message);
        self.events.dispatch(
            LifecycleEvent::Error,
            &EventDetail::new(name, container).with_message(message),
        );
    }

    /// Mount an application into a container element. Before loading
    /// finishes this parks the parameters and returns; a hidden instance is
    /// shown instead.
    pub fn mount(
        &mut self,
        name: &str,
        container: NodeId,
        base_route: Option<&str>,
    ) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            log::warn!("[Atrium Lifecycle] Mount of unknown application {}", name);
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        match app.state() {
            LifecycleState::KeepAliveHidden => return self.show(name),
            LifecycleState::Mounting | LifecycleState::Mounted => {
                log::debug!("[Atrium Lifecycle] {} already mounted", name);
                return Ok(());
            }
            LifecycleState::LoadError => {
                log::warn!("[Atrium Lifecycle] {} cannot mount after load error", name);
                return Ok(());
            }
            _ => {}
        }
        app.pending_mount = Some(PendingMount {
            container,
            base_route: base_route.map(|r| r.to_string()),
        });
        let ready = app.state() == LifecycleState::LoadFinished
            || (app.state() == LifecycleState::Unmount && app.load_complete());
        if ready {
            self.do_mount(name)
        } else {
            Ok(())
        }
    }

    fn do_mount(&mut self, name: &str) -> Result<(), EngineError> {
        // Container preparation.
        let (container_node, url, flags) = {
            let Some(app) = self.registry.get_mut(name) else {
                return Err(EngineError::UnknownApp(name.to_string()));
            };
            let Some(pending) = app.pending_mount.take() else { return Ok(()) };
            if let Some(route) = pending.base_route {
                app.base_route = Some(route);
            }
            (pending.container, app.url().clone(), app.flags)
        };
        if self.document.get(container_node).is_none() {
            return Err(EngineError::Dom(DomError::NoSuchNode(container_node)));
        }
        self.document.clear_children(container_node);
        let head = self.document.create_element("atrium-app-head", Vec::new());
        let body = self.document.create_element("atrium-app-body", Vec::new());
        self.document.append(container_node, head)?;
        self.document.append(container_node, body)?;
        let handle = ContainerHandle { container: container_node, head, body };

        self.events.dispatch(
            LifecycleEvent::Beforemount,
            &EventDetail::new(name, Some(container_node)),
        );

        {
            let Some(app) = self.registry.get_mut(name) else {
                return Err(EngineError::UnknownApp(name.to_string()));
            };
            app.transition(LifecycleState::Mounting);
            app.container = Some(handle);
        }
        self.patch.register_route(name, handle, Some(url.clone()));

        // Sandbox activation; the first active sandbox installs the patch
        // layer through the shared refcount.
        {
            let Some(app) = self.registry.get_mut(name) else {
                return Err(EngineError::UnknownApp(name.to_string()));
            };
            let route = app.base_route.clone();
            if let Some(sandbox) = app.sandbox.as_mut() {
                sandbox.start(route.as_deref(), &mut self.patch);
            }
        }

        // Clone the parsed fragment into the private regions.
        let fragment = self.registry.get_mut(name).and_then(|a| a.fragment.take());
        if let Some(fragment) = fragment {
            if let Some(frag_head) = fragment.head() {
                let children =
                    fragment.get(frag_head).map(|n| n.children.clone()).unwrap_or_default();
                for child in children {
                    self.document.import(&fragment, child, handle.head, Some(name))?;
                }
            }
            if let Some(frag_body) = fragment.body() {
                let children =
                    fragment.get(frag_body).map(|n| n.children.clone()).unwrap_or_default();
                for child in children {
                    self.document.import(&fragment, child, handle.body, Some(name))?;
                }
            }
            if let Some(app) = self.registry.get_mut(name) {
                app.fragment = Some(fragment);
            }
        }

        self.apply_styles(name, &url, flags, handle)?;

        let is_umd_remount = self
            .registry
            .get(name)
            .map(|a| {
                a.flags.contains(AppFlags::UMD)
                    && a.sandbox.as_ref().map(|s| s.has_snapshot()).unwrap_or(false)
            })
            .unwrap_or(false);
        if is_umd_remount {
            let Some(app) = self.registry.get_mut(name) else {
                return Err(EngineError::UnknownApp(name.to_string()));
            };
            if let Some(sandbox) = app.sandbox.as_mut() {
                sandbox.rebuild_snapshot(&mut self.real_scope, &mut self.bus, &mut self.timers);
            }
        } else {
            self.execute_scripts(name);
        }

        // Auto-executing bundles: capture side effects once, before the
        // external mount hook first runs, then invoke the hook.
        let has_hooks = self.registry.get(name).map(|a| a.hooks.is_some()).unwrap_or(false);
        if has_hooks {
            let Some(app) = self.registry.get_mut(name) else {
                return Err(EngineError::UnknownApp(name.to_string()));
            };
            app.flags |= AppFlags::UMD;
            if let Some(sandbox) = app.sandbox.as_mut() {
                if !sandbox.has_snapshot() {
                    sandbox.record_snapshot();
                }
            }
            let hook = app.hooks.as_ref().map(|h| h.mount.clone());
            if let Some(hook) = hook {
                self.patch.enter(name);
                if let Err(e) = hook() {
                    log::error!("[Atrium Lifecycle] {} mount hook failed: {}", name, e);
                }
                self.patch.exit();
            }
        }

        let (version, lane) = {
            let Some(app) = self.registry.get_mut(name) else {
                return Err(EngineError::UnknownApp(name.to_string()));
            };
            app.transition(LifecycleState::Mounted);
            let lane = if app.flags.contains(AppFlags::MACRO_TASK) {
                TaskLane::Macro
            } else {
                TaskLane::Micro
            };
            (app.version(), lane)
        };
        self.queue.schedule(lane, name, version, LifecycleEvent::Mounted);
        Ok(())
    }

    fn apply_styles(
        &mut self,
        name: &str,
        app_url: &Url,
        flags: AppFlags,
        handle: ContainerHandle,
    ) -> Result<(), EngineError> {
        let styles: Vec<(Option<Url>, String)> = {
            let Some(app) = self.registry.get(name) else { return Ok(()) };
            app.bundle
                .styles
                .iter()
                .map(|s| (s.url.clone(), s.code.clone().unwrap_or_default()))
                .collect()
        };
        let disable_scoping = flags.contains(AppFlags::DISABLE_SCOPING);
        for (sheet_url, code) in styles {
            let text = if disable_scoping {
                code
            } else {
                let base = sheet_url.unwrap_or_else(|| app_url.clone());
                let scoper = StyleScoper::new(name)
                    .with_base(base)
                    .with_quirks(self.config.quirks);
                match scoper.scope(&code, &mut self.scratch) {
                    Ok(scoped) => scoped,
                    Err(e) => {
                        log::warn!(
                            "[Atrium Lifecycle] {}: style parse failed ({}); inserting unscoped",
                            name,
                            e
                        );
                        code
                    }
                }
            };
            self.patch.enter(name);
            let style_el = self.patch.create_element(&mut self.document, "style", Vec::new());
            self.patch.exit();
            let text_node = self.document.create_text(&text);
            self.document.append(style_el, text_node)?;
            let target = if self.patch.is_installed() {
                self.document.head().unwrap_or(handle.head)
            } else {
                handle.head
            };
            self.patch.append(&mut self.document, target, style_el)?;
        }
        Ok(())
    }

    /// Synchronous scripts run in document order, then deferred ones in
    /// their relative order. Per-script failures are logged and execution
    /// continues.
    fn execute_scripts(&mut self, name: &str) {
        let scripts: Vec<(Option<Url>, String)> = {
            let Some(app) = self.registry.get(name) else { return };
            let sync = app
                .bundle
                .scripts
                .iter()
                .filter(|s| !s.is_deferred())
                .map(|s| (s.url.clone(), s.code.clone().unwrap_or_default()));
            let deferred = app
                .bundle
                .scripts
                .iter()
                .filter(|s| s.is_deferred())
                .map(|s| (s.url.clone(), s.code.clone().unwrap_or_default()));
            sync.chain(deferred).collect()
        };
        self.patch.enter(name);
        for (url, code) in scripts {
            let Some(app) = self.registry.get_mut(name) else { break };
            let mut env = ExecEnv {
                sandbox: app.sandbox.as_mut(),
                real: &mut self.real_scope,
                bus: &mut self.bus,
                timers: &mut self.timers,
                patch: &mut self.patch,
                document: &mut self.document,
            };
            if let Err(e) = self.executor.execute(name, url.as_ref(), &code, &mut env) {
                match &url {
                    Some(url) => log::error!(
                        "[Atrium Lifecycle] {}: script {} failed: {}; continuing",
                        name,
                        url,
                        e
                    ),
                    None => log::error!(
                        "[Atrium Lifecycle] {}: inline script failed: {}; continuing",
                        name,
                        e
                    ),
                }
            }
        }
        self.patch.exit();
    }

    /// Unmount an application. With `destroy` (or after a load error) the
    /// registry entry is removed; otherwise the instance is cached for
    /// reuse.
    pub fn unmount(&mut self, name: &str, destroy: bool) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            log::warn!("[Atrium Lifecycle] Unmount of unknown application {}", name);
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        let state = app.state();

        // Keep-alive opt-in: a soft unmount suspends instead of tearing
        // down. Destroy overrides and removes everything.
        if !destroy
            && app.flags.contains(AppFlags::KEEP_ALIVE)
            && matches!(
                state,
                LifecycleState::Mounted | LifecycleState::KeepAliveHidden
            )
        {
            return self.hide(name);
        }

        match state {
            LifecycleState::Mounting | LifecycleState::Mounted | LifecycleState::KeepAliveHidden => {
                let container = app.container.map(|h| h.container);
                self.events
                    .dispatch(LifecycleEvent::Unmount, &EventDetail::new(name, container));

                // Private teardown signal, delivered before the sandbox is
                // torn down so in-app listeners still fire.
                self.bus.dispatch(&format!("unmount-{}", name));

                let hook = self
                    .registry
                    .get(name)
                    .and_then(|a| a.hooks.as_ref().map(|h| h.unmount.clone()));
                if let Some(hook) = hook {
                    self.patch.enter(name);
                    if let Err(e) = hook() {
                        log::error!("[Atrium Lifecycle] {} unmount hook failed: {}", name, e);
                    }
                    self.patch.exit();
                }

                let Some(app) = self.registry.get_mut(name) else {
                    return Err(EngineError::UnknownApp(name.to_string()));
                };
                if let Some(sandbox) = app.sandbox.as_mut() {
                    sandbox.stop(
                        &mut self.patch,
                        &mut self.real_scope,
                        &mut self.bus,
                        &mut self.timers,
                    );
                }
                let handle = app.container.take();
                app.transition(LifecycleState::Unmount);
                self.patch.unregister_route(name);
                if let Some(handle) = handle {
                    self.document.clear_children(handle.container);
                }
            }
            LifecycleState::NotLoaded | LifecycleState::LoadingSource | LifecycleState::LoadFinished => {
                app.pending_mount = None;
                app.transition(LifecycleState::Unmount);
            }
            LifecycleState::LoadError | LifecycleState::Unmount => {}
        }

        if destroy || state == LifecycleState::LoadError {
            self.registry.remove(name);
            self.events.clear_app_handlers(name);
            log::debug!("[Atrium Registry] {} removed", name);
        }
        Ok(())
    }

    /// Suspend a mounted application keep-alive: rendering is hidden but
    /// DOM, sandbox, and effects survive for fast resume.
    pub fn hide(&mut self, name: &str) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        if !app.is_mounted() {
            log::debug!("[Atrium Lifecycle] {} not mounted; hide ignored", name);
            return Ok(());
        }
        app.transition(LifecycleState::KeepAliveHidden);
        let container = app.container.map(|h| h.container);
        if let Some(node) = container.and_then(|c| self.document.get_mut(c)) {
            node.set_attribute("hidden", "");
        }
        self.bus.dispatch(&format!("appstate-change-{}", name));
        Ok(())
    }

    /// Resume a hidden application.
    pub fn show(&mut self, name: &str) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        if !app.is_hidden() {
            log::debug!("[Atrium Lifecycle] {} not hidden; show ignored", name);
            return Ok(());
        }
        app.transition(LifecycleState::Mounted);
        let container = app.container.map(|h| h.container);
        if let Some(node) = container.and_then(|c| self.document.get_mut(c)) {
            node.remove_attribute("hidden");
        }
        self.bus.dispatch(&format!("appstate-change-{}", name));
        Ok(())
    }

    /// Destroy an application from any state, live or hidden.
    pub fn force_destroy(&mut self, name: &str) -> Result<(), EngineError> {
        self.unmount(name, true)
    }

    /// Clear an application's data channels without touching its lifecycle.
    pub fn clear_data(&mut self, name: &str) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        match app.sandbox.as_mut() {
            Some(sandbox) => {
                sandbox.host_channel.clear();
                sandbox.app_channel.clear();
                log::debug!("[Atrium Lifecycle] {} data channels cleared", name);
            }
            None => log::debug!("[Atrium Lifecycle] {} has no sandbox; clear ignored", name),
        }
        Ok(())
    }

    /// Register external mount/unmount hooks for an auto-executing bundle.
    pub fn register_hooks(&mut self, name: &str, hooks: UmdHooks) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            log::warn!("[Atrium Lifecycle] Hooks for unknown application {}", name);
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        app.hooks = Some(hooks);
        Ok(())
    }

    /// Dispatch deferred micro-lane events. Tasks whose application has
    /// since transitioned are skipped.
    pub fn run_microtasks(&mut self) -> usize {
        self.run_tasks(TaskLane::Micro)
    }

    /// Dispatch deferred macro-lane events.
    pub fn run_macrotasks(&mut self) -> usize {
        self.run_tasks(TaskLane::Macro)
    }

    fn run_tasks(&mut self, lane: TaskLane) -> usize {
        let mut dispatched = 0;
        for task in self.queue.drain(lane) {
            let Some(app) = self.registry.get(&task.app) else {
                log::debug!("[Atrium Lifecycle] Deferred {} for removed {} skipped", task.event.name(), task.app);
                continue;
            };
            if app.version() != task.version || !app.is_mounted() {
                log::debug!(
                    "[Atrium Lifecycle] {}: deferred {} skipped, state changed",
                    task.app,
                    task.event.name()
                );
                continue;
            }
            let detail = EventDetail::new(&task.app, app.container.map(|h| h.container));
            self.events.dispatch(task.event, &detail);
            dispatched += 1;
        }
        dispatched
    }

    /// Send data from the host page into an application.
    pub fn dispatch_to_app(&mut self, name: &str, data: Value) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        match app.sandbox.as_mut() {
            Some(sandbox) => sandbox.host_channel.dispatch(data),
            None => log::debug!("[Atrium Channel] {} has no sandbox; data dropped", name),
        }
        Ok(())
    }

    /// Send data from an application to the host page. Also raises a
    /// `datachange` notification for listeners on the real container.
    pub fn dispatch_from_app(&mut self, name: &str, data: Value) -> Result<(), EngineError> {
        let Some(app) = self.registry.get_mut(name) else {
            return Err(EngineError::UnknownApp(name.to_string()));
        };
        match app.sandbox.as_mut() {
            Some(sandbox) => sandbox.app_channel.dispatch(data),
            None => log::debug!("[Atrium Channel] {} has no sandbox; data dropped", name),
        }
        self.bus.dispatch(&format!("datachange-{}", name));
        Ok(())
    }

    /// Listen on an application's app-to-host channel.
    pub fn listen_from_app(
        &mut self,
        name: &str,
        callback: ChannelCallback,
        auto_trigger: bool,
    ) -> Option<CallbackId> {
        self.registry
            .get_mut(name)
            .and_then(|a| a.sandbox.as_mut())
            .map(|s| s.app_channel.add_listener(callback, auto_trigger))
    }

    /// Most recent host-to-app data for an application.
    pub fn data_for_app(&self, name: &str) -> Option<Value> {
        self.registry
            .get(name)
            .and_then(|a| a.sandbox.as_ref())
            .and_then(|s| s.host_channel.get_data().cloned())
    }

    /// Most recent app-to-host data for an application.
    pub fn data_from_app(&self, name: &str) -> Option<Value> {
        self.registry
            .get(name)
            .and_then(|a| a.sandbox.as_ref())
            .and_then(|s| s.app_channel.get_data().cloned())
    }

    /// The shared broadcast channel visible to the host and every app.
    pub fn global_channel(&mut self) -> &mut DataChannel {
        &mut self.global_channel
    }

    /// Patched attribute assignment: relative resource paths are completed
    /// against the owning application's base URL, and a `data` assignment
    /// on a container root routes through the data channel.
    pub fn handle_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), EngineError> {
        // Container identity is fixed while its application is live; a
        // rename or relocate has to go through unmount + construct.
        if name == "name" || name == "url" {
            let owner = self
                .document
                .get(node)
                .filter(|n| n.tag_name() == Some(CONTAINER_TAG))
                .and_then(|n| n.get_attribute("name"))
                .map(|s| s.to_string());
            if let Some(owner) = owner {
                let live = self
                    .registry
                    .get(&owner)
                    .map(|app| app.state() != LifecycleState::Unmount)
                    .unwrap_or(false);
                if live {
                    log::warn!(
                        "[Atrium Patch] {} change on container of live app {} ignored",
                        name,
                        owner
                    );
                    return Ok(());
                }
            }
        }

        match self.patch.set_attribute(&mut self.document, node, name, value) {
            Ok(AttrOutcome::Set) => Ok(()),
            Ok(AttrOutcome::RouteData(data)) => {
                let owner = self
                    .document
                    .get(node)
                    .and_then(|n| n.get_attribute("name"))
                    .map(|s| s.to_string());
                match owner {
                    Some(owner) if self.registry.contains(&owner) => {
                        self.dispatch_to_app(&owner, Value::string(&data))
                    }
                    _ => {
                        log::debug!("[Atrium Channel] data attribute with no owning app dropped");
                        Ok(())
                    }
                }
            }
            Err(e) => {
                log::warn!("[Atrium Patch] Attribute {} rejected: {}", name, e);
                Err(EngineError::Dom(e))
            }
        }
    }
}

impl Default for Atrium {
    fn default() -> Self {
        Self::new()
    }
}
