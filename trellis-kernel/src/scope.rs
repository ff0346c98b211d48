//! Scoped execution: exclusive units of work against one page.

use crate::page::Page;
use crate::registry::PageRegistry;
use std::sync::Arc;
use trellis_api::Handle;

/// Runs units of work under a page's exclusive execution lock.
///
/// Two concurrent calls for the same handle never run their closures
/// concurrently; calls for different handles do not constrain each other.
/// There is no cancellation: once a unit of work starts it runs to
/// completion and holds the lock until it returns, even if the caller has
/// timed out externally. Remote method side effects are not safe to abort
/// midway, so the work is never torn down from outside.
pub struct ScopedExecutor {
    registry: Arc<PageRegistry>,
}

impl ScopedExecutor {
    pub fn new(registry: Arc<PageRegistry>) -> Self {
        ScopedExecutor { registry }
    }

    /// Look up `handle` and run `f` against it.
    ///
    /// An unknown or expired handle yields `f(None)` — absence is a
    /// normal outcome, not an error. A present page is passed as
    /// `f(Some(page))` under the context's lock, which is released on
    /// every exit path. Expiry is only observed through the registry's
    /// lookup; no additional check happens here.
    pub async fn with_page<R>(&self, handle: Handle, f: impl FnOnce(Option<&mut Page>) -> R) -> R {
        match self.registry.lookup(handle) {
            None => f(None),
            Some(ctx) => {
                let mut guard = ctx.lock_page().await;
                f(guard.as_mut())
            }
        }
    }
}
