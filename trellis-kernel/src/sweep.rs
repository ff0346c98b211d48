//! Background expiration sweeper.

use crate::registry::PageRegistry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodic task removing expired page contexts from a registry.
///
/// Runs independently of request tasks. Each tick scans the registry's
/// index without holding any per-page execution lock, so a long sweep
/// never blocks live requests.
pub struct Sweeper {
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    pub fn spawn(registry: Arc<PageRegistry>, every: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick fires immediately; skip it so a fresh
            // registry is not swept before serving anything.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = registry.sweep_expired(Utc::now());
                if removed > 0 {
                    tracing::info!(removed, live = registry.context_count(), "sweep pass");
                }
            }
        });
        Sweeper { task }
    }

    /// Stop sweeping. Contexts already expired stay in the registry until
    /// a lookup observes their expiry or a new sweeper runs.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}
