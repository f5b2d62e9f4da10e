//! Resource extraction pipeline.
//!
//! Partitions an application's fetched markup into style and script
//! resource records, leaves comment placeholders preserving original
//! document position, and matches asynchronous fetch results back to their
//! origin records by index rather than arrival order.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use atrium_dom::document::{Document, DomError, DOCUMENT_NODE};
use atrium_dom::markup::MarkupError;
use atrium_dom::node::NodeId;
use atrium_dom::patch::PatchContext;
use atrium_sandbox::effects::{EventBus, TimerHost};
use atrium_sandbox::sandbox::Sandbox;
use atrium_sandbox::scope::RealScope;
use atrium_types::url::Url;

/// The two resource classes the lifecycle waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Style,
    Script,
}

impl ResourceClass {
    /// Get class name.
    pub fn name(&self) -> &'static str {
        match self {
            ResourceClass::Style => "style",
            ResourceClass::Script => "script",
        }
    }
}

/// One stylesheet resource extracted from the markup.
#[derive(Debug, Clone)]
pub struct StyleResource {
    /// Resolved URL for external sheets; `None` for inline ones.
    pub url: Option<Url>,
    /// Source text; lazily filled once fetched.
    pub code: Option<String>,
    /// Shareable across applications through the global cache.
    pub global: bool,
    /// Comment node preserving the original document position.
    pub placeholder: Option<NodeId>,
}

/// One script resource extracted from the markup.
#[derive(Debug, Clone)]
pub struct ScriptResource {
    /// Resolved URL for external scripts; `None` for inline ones.
    pub url: Option<Url>,
    /// Source text; lazily filled once fetched.
    pub code: Option<String>,
    /// `defer` attribute.
    pub defer: bool,
    /// `async` attribute.
    pub async_load: bool,
    /// `type="module"`; module scripts are deferred.
    pub module: bool,
    /// Shareable across applications through the global cache.
    pub global: bool,
    /// Comment node preserving the original document position.
    pub placeholder: Option<NodeId>,
}

impl ScriptResource {
    /// Whether this script runs after all resources resolve rather than in
    /// document order.
    pub fn is_deferred(&self) -> bool {
        self.defer || self.async_load || self.module
    }
}

/// Ordered style and script records for one application.
#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    pub styles: Vec<StyleResource>,
    pub scripts: Vec<ScriptResource>,
}

impl SourceBundle {
    /// Whether every record of a class has its source text.
    pub fn class_complete(&self, class: ResourceClass) -> bool {
        match class {
            ResourceClass::Style => self.styles.iter().all(|s| s.code.is_some()),
            ResourceClass::Script => self.scripts.iter().all(|s| s.code.is_some()),
        }
    }

    /// Fill a record's source text by class and index. Returns false when
    /// the index does not name a record.
    pub fn fill(&mut self, class: ResourceClass, index: usize, code: String) -> bool {
        match class {
            ResourceClass::Style => match self.styles.get_mut(index) {
                Some(record) => {
                    record.code = Some(code);
                    true
                }
                None => false,
            },
            ResourceClass::Script => match self.scripts.get_mut(index) {
                Some(record) => {
                    record.code = Some(code);
                    true
                }
                None => false,
            },
        }
    }
}

/// Pipeline error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Markup parse failure.
    Markup(MarkupError),
    /// Tree operation failure during partitioning.
    Dom(DomError),
    /// Markup missing a required structural region.
    MissingRegion(&'static str),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Markup(e) => write!(f, "markup error: {}", e),
            PipelineError::Dom(e) => write!(f, "dom error: {}", e),
            PipelineError::MissingRegion(region) => {
                write!(f, "markup missing required {} region", region)
            }
        }
    }
}

impl From<MarkupError> for PipelineError {
    fn from(e: MarkupError) -> Self {
        PipelineError::Markup(e)
    }
}

impl From<DomError> for PipelineError {
    fn from(e: DomError) -> Self {
        PipelineError::Dom(e)
    }
}

/// Partition a parsed fragment into a source bundle.
///
/// Extracted elements are replaced in the fragment by comment placeholders
/// so the original document position survives until mount re-materializes
/// them. Relative URLs are resolved against `base`.
pub fn extract(fragment: &mut Document, base: &Url) -> Result<SourceBundle, PipelineError> {
    if fragment.head().is_none() {
        return Err(PipelineError::MissingRegion("head"));
    }
    if fragment.body().is_none() {
        return Err(PipelineError::MissingRegion("body"));
    }

    enum Planned {
        ExternalStyle { url: Url, global: bool },
        InlineStyle { code: String, global: bool },
        ExternalScript { url: Url, defer: bool, async_load: bool, module: bool, global: bool },
        InlineScript { code: String, defer: bool, async_load: bool, module: bool, global: bool },
    }

    let mut planned: Vec<(NodeId, Planned)> = Vec::new();
    for id in fragment.query_selector_all(DOCUMENT_NODE, "*") {
        let Some(node) = fragment.get(id) else { continue };
        match node.tag_name() {
            Some("link") => {
                if node.get_attribute("rel").unwrap_or("stylesheet") != "stylesheet" {
                    continue;
                }
                let Some(href) = node.get_attribute("href") else { continue };
                let global = node.get_attribute("global").is_some();
                match Url::parse(&base.resolve(href)) {
                    Ok(url) => planned.push((id, Planned::ExternalStyle { url, global })),
                    Err(e) => {
                        log::warn!("[Atrium Pipeline] Unusable stylesheet href {:?}: {}", href, e);
                    }
                }
            }
            Some("style") => {
                let global = node.get_attribute("global").is_some();
                let code = fragment.text_content(id);
                planned.push((id, Planned::InlineStyle { code, global }));
            }
            Some("script") => {
                let script_type = node.get_attribute("type").unwrap_or("text/javascript");
                let module = script_type == "module";
                if !module && script_type != "text/javascript" {
                    continue;
                }
                let defer = node.get_attribute("defer").is_some();
                let async_load = node.get_attribute("async").is_some();
                let global = node.get_attribute("global").is_some();
                match node.get_attribute("src").map(|s| s.to_string()) {
                    Some(src) => match Url::parse(&base.resolve(&src)) {
                        Ok(url) => planned.push((
                            id,
                            Planned::ExternalScript { url, defer, async_load, module, global },
                        )),
                        Err(e) => {
                            log::warn!("[Atrium Pipeline] Unusable script src {:?}: {}", src, e);
                        }
                    },
                    None => {
                        let code = fragment.text_content(id);
                        planned.push((
                            id,
                            Planned::InlineScript { code, defer, async_load, module, global },
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    let mut bundle = SourceBundle::default();
    for (id, action) in planned {
        match action {
            Planned::ExternalStyle { url, global } => {
                let placeholder =
                    fragment.create_comment(&format!("atrium-style-{}", bundle.styles.len()));
                fragment.replace(id, placeholder)?;
                bundle.styles.push(StyleResource {
                    url: Some(url),
                    code: None,
                    global,
                    placeholder: Some(placeholder),
                });
            }
            Planned::InlineStyle { code, global } => {
                let placeholder =
                    fragment.create_comment(&format!("atrium-style-{}", bundle.styles.len()));
                fragment.replace(id, placeholder)?;
                bundle.styles.push(StyleResource {
                    url: None,
                    code: Some(code),
                    global,
                    placeholder: Some(placeholder),
                });
            }
            Planned::ExternalScript { url, defer, async_load, module, global } => {
                let placeholder =
                    fragment.create_comment(&format!("atrium-script-{}", bundle.scripts.len()));
                fragment.replace(id, placeholder)?;
                bundle.scripts.push(ScriptResource {
                    url: Some(url),
                    code: None,
                    defer,
                    async_load,
                    module,
                    global,
                    placeholder: Some(placeholder),
                });
            }
            Planned::InlineScript { code, defer, async_load, module, global } => {
                let placeholder =
                    fragment.create_comment(&format!("atrium-script-{}", bundle.scripts.len()));
                fragment.replace(id, placeholder)?;
                bundle.scripts.push(ScriptResource {
                    url: None,
                    code: Some(code),
                    defer,
                    async_load,
                    module,
                    global,
                    placeholder: Some(placeholder),
                });
            }
        }
    }

    log::debug!(
        "[Atrium Pipeline] Extracted {} style(s), {} script(s)",
        bundle.styles.len(),
        bundle.scripts.len()
    );
    Ok(bundle)
}

/// Handle to one in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchId(pub u64);

/// What an in-flight fetch resolves into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchKind {
    /// The application's markup document.
    Markup,
    /// One resource record, addressed by class and index.
    Resource(ResourceClass, usize),
}

/// One fetch issued through the caller-supplied fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: FetchId,
    pub app: String,
    /// Registry generation of the instance this fetch belongs to. A
    /// completion whose generation no longer matches is discarded.
    pub generation: u64,
    pub kind: FetchKind,
    pub url: Url,
}

/// Fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure.
    Network(String),
    /// Non-success status code.
    Status(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {}", msg),
            FetchError::Status(code) => write!(f, "unexpected status {}", code),
        }
    }
}

/// Caller-supplied fetch transport. The engine issues requests through it
/// and the embedder reports completion via `Atrium::complete_fetch`.
pub trait Fetcher {
    /// Begin fetching. Must not complete synchronously.
    fn fetch(&mut self, request: &FetchRequest);
}

/// Default fetcher: leaves every request pending for the embedder to
/// complete through the engine's pending-request table.
#[derive(Debug, Default)]
pub struct NullFetcher;

impl Fetcher for NullFetcher {
    fn fetch(&mut self, request: &FetchRequest) {
        log::debug!("[Atrium Pipeline] Fetch pending: {}", request.url);
    }
}

/// Global resource cache shared across applications, keyed by resolved URL.
#[derive(Debug, Default)]
pub struct ResourceCache {
    styles: HashMap<String, String>,
    scripts: HashMap<String, String>,
}

impl ResourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        ResourceCache::default()
    }

    fn table(&self, class: ResourceClass) -> &HashMap<String, String> {
        match class {
            ResourceClass::Style => &self.styles,
            ResourceClass::Script => &self.scripts,
        }
    }

    /// Look up cached source text.
    pub fn get(&self, class: ResourceClass, url: &Url) -> Option<&String> {
        self.table(class).get(&url.to_string())
    }

    /// Cache source text for a shareable resource.
    pub fn insert(&mut self, class: ResourceClass, url: &Url, code: &str) {
        let table = match class {
            ResourceClass::Style => &mut self.styles,
            ResourceClass::Script => &mut self.scripts,
        };
        table.insert(url.to_string(), code.to_string());
    }

    /// Number of cached entries in a class.
    pub fn len(&self, class: ResourceClass) -> usize {
        self.table(class).len()
    }
}

/// Everything a script executor may touch while application code runs.
pub struct ExecEnv<'a> {
    pub sandbox: Option<&'a mut Sandbox>,
    pub real: &'a mut RealScope,
    pub bus: &'a mut EventBus,
    pub timers: &'a mut TimerHost,
    pub patch: &'a mut PatchContext,
    pub document: &'a mut Document,
}

/// Script execution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError(pub String);

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script error: {}", self.0)
    }
}

/// Caller-supplied script execution backend.
pub trait ScriptExecutor {
    /// Run one script in the application's environment. Errors are logged
    /// by the lifecycle and never abort the mount.
    fn execute(
        &mut self,
        app: &str,
        url: Option<&Url>,
        code: &str,
        env: &mut ExecEnv<'_>,
    ) -> Result<(), ScriptError>;
}

/// Default executor: accepts every script without interpreting it.
#[derive(Debug, Default)]
pub struct NullExecutor;

impl ScriptExecutor for NullExecutor {
    fn execute(
        &mut self,
        app: &str,
        url: Option<&Url>,
        _code: &str,
        _env: &mut ExecEnv<'_>,
    ) -> Result<(), ScriptError> {
        match url {
            Some(url) => log::debug!("[Atrium Pipeline] {}: skipping script {}", app, url),
            None => log::debug!("[Atrium Pipeline] {}: skipping inline script", app),
        }
        Ok(())
    }
}
