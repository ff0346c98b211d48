//! Kernel error types.
//!
//! Absence of a page (unknown or expired handle) is not an error; it is
//! expressed as `Option`/[`crate::service::PageOutcome::NotFound`] everywhere.

use thiserror::Error;
use trellis_api::NodeId;

#[derive(Debug, Error)]
pub enum KernelError {
    /// Remote method resolution or invocation failed.
    #[error("dispatch fault: {0}")]
    DispatchFault(#[from] DispatchFault),

    /// Walking or serializing the component tree failed. The page's
    /// committed state is intact; dirty flags from the failed pass are
    /// preserved for the next attempt.
    #[error("build fault at node {node}: {source}")]
    BuildFault {
        node: NodeId,
        #[source]
        source: anyhow::Error,
    },

    /// Resource exhaustion on page creation. Fatal to that request only.
    #[error("registry fault: {0}")]
    RegistryFault(String),
}

/// Why a remote method dispatch failed.
#[derive(Debug, Error)]
pub enum DispatchFault {
    #[error("component type `{component}` has no remote method `{method}`")]
    UnknownMethod { component: String, method: String },

    #[error("method `{method}` expects {expected} argument(s), got {got}")]
    ArityMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index} of `{method}` could not be decoded: {source}")]
    BadArgument {
        method: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("target component {0} is not present in the page tree")]
    MissingComponent(NodeId),

    #[error("method `{method}` failed: {source}")]
    Invocation {
        method: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchFault {
    /// Wrap an application-level failure raised by an invoked method.
    pub fn invocation(method: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        DispatchFault::Invocation {
            method: method.into(),
            source: source.into(),
        }
    }
}
