//! Trellis Kernel - the server-resident page engine core.
//!
//! This crate contains the engine behind stateful, session-bound pages:
//! - Page registry (creation, concurrent lookup, expiration sweep)
//! - Scoped execution (exclusive per-page units of work)
//! - Component tree with dirty tracking
//! - Tree builder (full and incremental renders, custom-build hooks)
//! - Remote method dispatch (explicit declarations, shadowing-aware)
//! - View routing (path globs and `regex:` patterns)
//!
//! The HTTP transport, the markup-to-bytes transform, and component
//! discovery are external collaborators; they talk to this crate through
//! [`service::PageService`] and the types in `trellis-api`.

pub mod component;
pub mod dispatch;
pub mod registry;
pub mod scope;
pub mod serialize;
pub mod service;
pub mod settings;
pub mod sweep;
pub mod transform;
pub mod views;

mod error;
mod page;

pub use component::{
    AttrValue, BuildPhase, Component, ComponentNode, ComponentType, HookDecl, MethodDecl,
    ScriptCall, TreeBuilder,
};
pub use dispatch::DispatchTable;
pub use error::{DispatchFault, KernelError};
pub use page::Page;
pub use registry::{LifecycleState, PageContext, PageRegistry, RemovalListener, ScopedValues};
pub use scope::ScopedExecutor;
pub use serialize::{AttributeSerializer, JsonAttributeSerializer};
pub use service::{
    LifecycleListener, OpenFlow, PageFlowFilter, PageOutcome, PageService, RenderBody,
    RenderResponse,
};
pub use settings::Settings;
pub use sweep::Sweeper;
pub use transform::{Transform, TransformPool};
pub use views::{ViewDecl, ViewRegistry};
