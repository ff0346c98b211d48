//! Engine configuration.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for the page engine. All durations are milliseconds in the
/// serialized form.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Time a freshly created page may sit before its first interaction.
    pub initial_max_inactivity_ms: u64,
    /// Inactivity allowed between interactions once a page is active.
    pub max_inactivity_ms: u64,
    /// How often the background sweeper scans for expired pages.
    pub sweep_interval_ms: u64,
    /// Upper bound on live page contexts; `None` means unbounded.
    pub max_contexts: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            initial_max_inactivity_ms: 30_000,
            max_inactivity_ms: 70_000,
            sweep_interval_ms: 60_000,
            max_contexts: None,
        }
    }
}

impl Settings {
    pub fn initial_max_inactivity(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.initial_max_inactivity_ms as i64)
    }

    pub fn max_inactivity(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.max_inactivity_ms as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}
