//! Document-Tree Patch Layer
//!
//! One owned `PatchContext` carries the process-wide interception state:
//! the current-application marker, the per-application container routing
//! table, and the install refcount. While installed, element creation tags
//! nodes with the current application, mutations issued against the host
//! head/body are redirected into that application's private regions, and
//! queries are scoped to its container.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use atrium_types::name::CONTAINER_TAG;
use atrium_types::url::Url;

use crate::document::{Document, DomError, DOCUMENT_NODE};
use crate::node::{Attribute, NodeId};

/// The three nodes making up one application's private rendering container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHandle {
    /// The container root element (an `atrium-app` element).
    pub container: NodeId,
    /// The private head-equivalent region.
    pub head: NodeId,
    /// The private body-equivalent region.
    pub body: NodeId,
}

/// One application's routing entry.
#[derive(Debug, Clone)]
struct AppRoute {
    handle: ContainerHandle,
    base: Option<Url>,
}

/// Outcome of a patched attribute assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOutcome {
    /// The attribute was written to the tree.
    Set,
    /// The value was a `data` assignment on a container root element and
    /// must be routed through the application's data channel instead.
    RouteData(String),
}

/// Selectors that always query the real document, even while an
/// application is current.
const ROOT_SELECTORS: &[&str] = &["html", "head", "body", ":root"];

/// Attributes completed against the owning application's base URL.
const URL_ATTRIBUTES: &[&str] = &["src", "href"];

/// The process-wide patch state.
#[derive(Debug, Default)]
pub struct PatchContext {
    /// Name of the application whose code is presently executing.
    current_app: Option<String>,
    /// Per-application container routing.
    routes: HashMap<String, AppRoute>,
    /// Active-sandbox refcount; interception is live while non-zero.
    refcount: usize,
}

impl PatchContext {
    /// Create a new, uninstalled patch context.
    pub fn new() -> Self {
        PatchContext::default()
    }

    /// Reference-count an activation. Returns true when this call installed
    /// the interception (count went 0 -> 1).
    pub fn acquire(&mut self) -> bool {
        self.refcount += 1;
        if self.refcount == 1 {
            log::debug!("[Atrium Patch] Document interception installed");
            true
        } else {
            false
        }
    }

    /// Release one activation. Returns true when this call uninstalled the
    /// interception (count reached 0).
    pub fn release(&mut self) -> bool {
        if self.refcount == 0 {
            return false;
        }
        self.refcount -= 1;
        if self.refcount == 0 {
            log::debug!("[Atrium Patch] Document interception removed");
            true
        } else {
            false
        }
    }

    /// Whether interception is currently installed.
    pub fn is_installed(&self) -> bool {
        self.refcount > 0
    }

    /// Mark an application as currently executing. Must be paired with
    /// `exit` around every call into application code.
    pub fn enter(&mut self, app: &str) {
        self.current_app = Some(app.to_string());
    }

    /// Clear the current-application marker.
    pub fn exit(&mut self) {
        self.current_app = None;
    }

    /// The currently executing application, if any.
    pub fn current(&self) -> Option<&str> {
        self.current_app.as_deref()
    }

    /// Register an application's container routing.
    pub fn register_route(&mut self, app: &str, handle: ContainerHandle, base: Option<Url>) {
        self.routes.insert(app.to_string(), AppRoute { handle, base });
    }

    /// Remove an application's container routing.
    pub fn unregister_route(&mut self, app: &str) {
        self.routes.remove(app);
    }

    /// Look up an application's container handle.
    pub fn route(&self, app: &str) -> Option<ContainerHandle> {
        self.routes.get(app).map(|r| r.handle)
    }

    /// Create an element, tagging it with the current application while
    /// interception is installed.
    pub fn create_element(&self, doc: &mut Document, tag: &str, attrs: Vec<Attribute>) -> NodeId {
        let id = doc.create_element(tag, attrs);
        if self.is_installed() {
            if let (Some(app), Some(node)) = (self.current_app.as_ref(), doc.get_mut(id)) {
                node.owner_app = Some(app.clone());
            }
        }
        id
    }

    /// Append with head/body redirection for application-owned nodes.
    pub fn append(&self, doc: &mut Document, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent = self.redirect_parent(doc, parent, child);
        doc.append(parent, child)
    }

    /// Insert-before with head/body redirection. When the insertion is
    /// redirected away from the reference node's parent, the reference no
    /// longer applies and the child is appended to the private region.
    pub fn insert_before(
        &self,
        doc: &mut Document,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let target = self.redirect_parent(doc, parent, child);
        if target != parent {
            return doc.append(target, child);
        }
        doc.insert_before(parent, child, reference)
    }

    /// Replace an attached node. Replacement happens wherever the old node
    /// actually lives, so no redirection applies.
    pub fn replace(&self, doc: &mut Document, old: NodeId, new: NodeId) -> Result<(), DomError> {
        doc.replace(old, new)
    }

    /// Remove a node. No redirection applies.
    pub fn remove(&self, doc: &mut Document, node: NodeId) -> Result<(), DomError> {
        doc.remove(node)
    }

    fn redirect_parent(&self, doc: &Document, parent: NodeId, child: NodeId) -> NodeId {
        if !self.is_installed() {
            return parent;
        }
        let owner = match doc.get(child).and_then(|n| n.owner_app.clone()) {
            Some(owner) => owner,
            None => return parent,
        };
        let route = match self.routes.get(&owner) {
            Some(route) => route,
            None => return parent,
        };
        if Some(parent) == doc.head() {
            route.handle.head
        } else if Some(parent) == doc.body() {
            route.handle.body
        } else {
            parent
        }
    }

    /// Query with container scoping: while an application is current, a
    /// non-root selector searches only inside its container.
    pub fn query_selector(&self, doc: &Document, selector: &str) -> Option<NodeId> {
        self.query_selector_all(doc, selector).into_iter().next()
    }

    /// Query-all with container scoping.
    pub fn query_selector_all(&self, doc: &Document, selector: &str) -> Vec<NodeId> {
        let scope = self.query_scope(selector);
        doc.query_selector_all(scope, selector)
    }

    fn query_scope(&self, selector: &str) -> NodeId {
        if !self.is_installed() {
            return DOCUMENT_NODE;
        }
        if ROOT_SELECTORS.contains(&selector.trim()) {
            return DOCUMENT_NODE;
        }
        let current = match &self.current_app {
            Some(current) => current,
            None => return DOCUMENT_NODE,
        };
        match self.routes.get(current) {
            Some(route) => route.handle.container,
            None => DOCUMENT_NODE,
        }
    }

    /// Patched attribute assignment: completes relative resource paths
    /// against the owning application's base URL and routes the container
    /// root's `data` attribute through the data channel.
    pub fn set_attribute(
        &self,
        doc: &mut Document,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<AttrOutcome, DomError> {
        let target = doc.get(node).ok_or(DomError::NoSuchNode(node))?;
        if !target.is_element() {
            return Err(DomError::NotAnElement(node));
        }

        if self.is_installed()
            && target.tag_name() == Some(CONTAINER_TAG)
            && name == "data"
        {
            return Ok(AttrOutcome::RouteData(value.to_string()));
        }

        let mut completed = None;
        if self.is_installed() && URL_ATTRIBUTES.contains(&name) && !Url::is_absolute(value) {
            let owner = target.owner_app.clone().or_else(|| self.current_app.clone());
            if let Some(route) = owner.as_ref().and_then(|o| self.routes.get(o)) {
                if let Some(base) = &route.base {
                    completed = Some(base.resolve(value));
                }
            }
        }

        let value = completed.as_deref().unwrap_or(value);
        if let Some(target) = doc.get_mut(node) {
            target.set_attribute(name, value);
        }
        Ok(AttrOutcome::Set)
    }
}
