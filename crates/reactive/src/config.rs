//! Notification batching configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default debounce window, roughly one frame at 60 Hz.
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 16;

/// Controls whether state changes are delivered immediately or coalesced.
///
/// When enabled, changes are queued per path (latest wins) and delivered
/// once no new change has arrived for `timeout_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
        }
    }
}

impl BatchConfig {
    /// Batching enabled with the given debounce window.
    pub fn enabled(timeout_ms: u64) -> Self {
        Self {
            enabled: true,
            timeout_ms,
        }
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
