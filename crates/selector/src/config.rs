//! Selector configuration.

use serde::{Deserialize, Serialize};

/// Default bound on cached results per selector (or per parameter bucket).
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

/// Default number of execution-time samples kept for statistics.
pub const DEFAULT_TIMING_WINDOW: usize = 1000;

/// Tuning knobs shared by every selector a factory creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Maximum cached results before the oldest half is evicted.
    pub max_cache_size: usize,
    /// Number of recent miss-path execution times kept for statistics.
    pub timing_window: usize,
}

impl SelectorConfig {
    /// Returns a copy with a different cache bound. Zero is clamped to one.
    pub fn with_max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.max_cache_size = max_cache_size.max(1);
        self
    }

    /// Cache bound with the zero case clamped.
    #[inline]
    pub(crate) fn cache_bound(&self) -> usize {
        self.max_cache_size.max(1)
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            timing_window: DEFAULT_TIMING_WINDOW,
        }
    }
}
