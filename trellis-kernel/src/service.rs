//! Page services: the initialize and update units of work.
//!
//! The transport layer is external; it hands each request to one of these
//! flows and attaches the returned cache directives verbatim. Everything
//! that touches a page happens under that page's exclusive execution lock.

use crate::component::{ComponentNode, TreeBuilder};
use crate::dispatch::DispatchTable;
use crate::error::KernelError;
use crate::page::Page;
use crate::registry::PageRegistry;
use crate::scope::ScopedExecutor;
use crate::serialize::{AttributeSerializer, JsonAttributeSerializer};
use crate::settings::Settings;
use crate::sweep::Sweeper;
use crate::views::{ViewDecl, ViewRegistry};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use trellis_api::{Element, Handle, NodeId, RenderMode, UpdateOp, CACHE_DIRECTIVES};

/// Result of a request-level unit of work.
#[derive(Debug)]
pub enum PageOutcome {
    Rendered(RenderResponse),
    /// Unknown or expired handle, or no view matches the path. A normal
    /// outcome; the transport turns it into its own not-found response.
    NotFound,
    /// The admission policy refused to create a page.
    Denied,
}

/// What the transport sends back: a body for the external transform plus
/// the directives it must attach unchanged.
#[derive(Debug)]
pub struct RenderResponse {
    pub handle: Handle,
    pub mode: RenderMode,
    pub body: RenderBody,
    pub cache: &'static [(&'static str, &'static str)],
}

#[derive(Debug)]
pub enum RenderBody {
    Document(Element),
    Updates(Vec<UpdateOp>),
}

/// Observes page lifecycle checkpoints. All methods default to no-ops.
#[allow(unused_variables)]
pub trait LifecycleListener: Send + Sync {
    fn before_initialize(&self) {}
    fn after_initialize(&self) {}
    fn before_update(&self) {}
    fn after_update(&self) {}
    fn before_render(&self) {}
    fn after_render(&self) {}
    fn on_exception(&self, error: &KernelError) {}
}

/// Admission and accounting policy for page creation and updates.
#[allow(unused_variables)]
pub trait PageFlowFilter: Send + Sync {
    /// Return `false` to refuse creating a page for this request.
    fn before_page_create(&self, live_contexts: usize, remote_addr: &str) -> bool {
        true
    }
    fn on_page_create(&self, live_contexts: usize, remote_addr: &str, handle: Handle) {}
    fn on_page_update(&self, live_contexts: usize, handle: Handle, version: u64) {}
}

/// The default filter: admit everything.
pub struct OpenFlow;

impl PageFlowFilter for OpenFlow {}

/// Entry point tying the registry, view routing, dispatch, and tree
/// building together.
pub struct PageService {
    settings: Settings,
    registry: Arc<PageRegistry>,
    executor: ScopedExecutor,
    dispatch: Arc<DispatchTable>,
    views: ViewRegistry,
    serializer: Arc<dyn AttributeSerializer>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
    filter: Arc<dyn PageFlowFilter>,
}

impl PageService {
    pub fn new(settings: Settings, views: ViewRegistry) -> Self {
        let registry = Arc::new(PageRegistry::with_limit(settings.max_contexts));
        PageService {
            executor: ScopedExecutor::new(Arc::clone(&registry)),
            registry,
            dispatch: Arc::new(DispatchTable::new()),
            views,
            serializer: Arc::new(JsonAttributeSerializer),
            listeners: Vec::new(),
            filter: Arc::new(OpenFlow),
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<PageRegistry> {
        &self.registry
    }

    pub fn set_serializer(&mut self, serializer: Arc<dyn AttributeSerializer>) {
        self.serializer = serializer;
    }

    pub fn add_listener(&mut self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.push(listener);
    }

    pub fn set_flow_filter(&mut self, filter: Arc<dyn PageFlowFilter>) {
        self.filter = filter;
    }

    /// Start the background sweeper for this service's registry.
    pub fn start_sweeper(&self) -> Sweeper {
        Sweeper::spawn(Arc::clone(&self.registry), self.settings.sweep_interval())
    }

    /// First load: create a page for `path`, initialize its view chain,
    /// and render the full document.
    ///
    /// Expiration is set only after the render completes, so a slow
    /// render does not eat into the client's inactivity window. A failed
    /// build expires the context on the spot for the next sweep.
    pub async fn initialize(
        &self,
        remote_addr: &str,
        path: &str,
    ) -> Result<PageOutcome, KernelError> {
        if !self
            .filter
            .before_page_create(self.registry.context_count(), remote_addr)
        {
            return Ok(PageOutcome::Denied);
        }

        let Some(chain) = self.views.find_chain(path) else {
            return Ok(PageOutcome::NotFound);
        };

        let ctx = self
            .registry
            .create(remote_addr, self.settings.initial_max_inactivity(), |_| {})?;
        let handle = ctx.handle();
        self.filter
            .on_page_create(self.registry.context_count(), remote_addr, handle);

        let mut guard = ctx.lock_page().await;
        let built = self.initialize_locked(&chain);
        match built {
            Ok((root, document)) => {
                let mut page = Page::new();
                page.set_root(root);
                *guard = Some(page);
                drop(guard);

                ctx.mark_active();
                ctx.set_expires(Utc::now() + self.settings.initial_max_inactivity());
                Ok(PageOutcome::Rendered(RenderResponse {
                    handle,
                    mode: RenderMode::Init,
                    body: RenderBody::Document(document),
                    cache: CACHE_DIRECTIVES,
                }))
            }
            Err(error) => {
                drop(guard);
                for listener in &self.listeners {
                    listener.on_exception(&error);
                }
                // Expire the never-rendered context now; the next sweep
                // clears it instead of holding the slot for a full TTL.
                ctx.set_expires(Utc::now());
                Err(error)
            }
        }
    }

    fn initialize_locked(
        &self,
        chain: &[&ViewDecl],
    ) -> Result<(ComponentNode, Element), KernelError> {
        for listener in &self.listeners {
            listener.before_initialize();
        }
        let mut root = Self::construct_chain(chain);
        for listener in &self.listeners {
            listener.after_initialize();
        }

        for listener in &self.listeners {
            listener.before_render();
        }
        let document = TreeBuilder::new(self.serializer.as_ref()).full_build(&mut root)?;
        for listener in &self.listeners {
            listener.after_render();
        }
        Ok((root, document))
    }

    /// Build the view chain root-first. Each parent may decline to
    /// initialize its declared child, truncating the chain there.
    fn construct_chain(chain: &[&ViewDecl]) -> ComponentNode {
        let mut decls = chain.iter();
        let first = decls.next().expect("view chain is never empty");
        let mut root = ComponentNode::new((first.construct)());
        let mut current = root.id();

        for decl in decls {
            let parent = root
                .find_mut(current)
                .expect("current chain node was just inserted");
            if !parent.component().init_child() {
                break;
            }
            let child = ComponentNode::new((decl.construct)());
            current = parent.add_child(child);
        }
        root
    }

    /// Subsequent interaction: dispatch a remote method against the page
    /// identified by `handle` and render the incremental update.
    pub async fn update(
        &self,
        handle: Handle,
        target: NodeId,
        method: &str,
        args: &[Value],
    ) -> Result<PageOutcome, KernelError> {
        let result = self
            .executor
            .with_page(handle, |page| {
                let Some(root) = page.and_then(Page::root_mut) else {
                    return Ok(None);
                };

                for listener in &self.listeners {
                    listener.before_update();
                }
                self.dispatch.dispatch(root, target, method, args)?;
                for listener in &self.listeners {
                    listener.after_update();
                }

                for listener in &self.listeners {
                    listener.before_render();
                }
                let ops = TreeBuilder::new(self.serializer.as_ref()).incremental_build(root)?;
                for listener in &self.listeners {
                    listener.after_render();
                }
                Ok(Some(ops))
            })
            .await;

        match result {
            Ok(None) => Ok(PageOutcome::NotFound),
            Ok(Some(ops)) => {
                let expires = Utc::now() + self.settings.max_inactivity();
                if let Some(version) = self.registry.refresh(handle, expires) {
                    self.filter
                        .on_page_update(self.registry.context_count(), handle, version);
                }
                Ok(PageOutcome::Rendered(RenderResponse {
                    handle,
                    mode: RenderMode::Update,
                    body: RenderBody::Updates(ops),
                    cache: CACHE_DIRECTIVES,
                }))
            }
            Err(error) => {
                for listener in &self.listeners {
                    listener.on_exception(&error);
                }
                Err(error)
            }
        }
    }

    /// Render the page's current tree as-is, for the raw XML debug mode.
    pub async fn raw_tree(&self, handle: Handle) -> Result<PageOutcome, KernelError> {
        let result = self
            .executor
            .with_page(handle, |page| {
                let Some(root) = page.and_then(Page::root_mut) else {
                    return Ok(None);
                };
                TreeBuilder::new(self.serializer.as_ref())
                    .full_build(root)
                    .map(Some)
            })
            .await;

        match result {
            Ok(None) => Ok(PageOutcome::NotFound),
            Ok(Some(document)) => Ok(PageOutcome::Rendered(RenderResponse {
                handle,
                mode: RenderMode::RawTree,
                body: RenderBody::Document(document),
                cache: CACHE_DIRECTIVES,
            })),
            Err(error) => Err(error),
        }
    }

    /// Client-initiated close. Idempotent.
    pub fn close(&self, handle: Handle) {
        self.registry.remove(handle);
    }
}
