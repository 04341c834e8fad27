//! Selectors whose cache is partitioned by call arguments.
//!
//! UI code often queries one derived view with many runtime filters
//! (element type, page, status). With a single bounded cache, cycling
//! through filters evicts entries belonging to other filters. A
//! [`ParametricSelector`] keeps one bucket per argument fingerprint, each
//! with its own bound, so `(state, type=text)` can never evict
//! `(state, type=image)`.
//!
//! Buckets themselves are never evicted: each distinct argument list (one
//! per page number, say) adds a bucket that lives until the selector is
//! invalidated. Callers with open-ended arguments should watch
//! [`ParametricSelector::bucket_count`] and call `invalidate` when it grows
//! past what they are willing to hold. Total memory is bounded by
//! `bucket_count() * max_cache_size` results.

use crate::config::SelectorConfig;
use crate::selector::{Select, Selector};
use crate::stats::SelectorStats;
use std::sync::Arc;
use tessera_core::{fingerprint_args, Result, State, Value};

/// A [`Selector`] with one cache bucket per distinct argument list.
///
/// Calls without arguments use the shared cache, exactly like a plain
/// selector.
#[derive(Clone, Debug)]
pub struct ParametricSelector {
    selector: Selector,
}

impl ParametricSelector {
    /// Creates a parametric selector with the default config.
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&State, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::with_config(name, SelectorConfig::default(), compute)
    }

    /// Creates a parametric selector; `config.max_cache_size` bounds each
    /// bucket independently.
    pub fn with_config<F>(name: impl Into<String>, config: SelectorConfig, compute: F) -> Self
    where
        F: Fn(&State, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            selector: Selector::with_config(name, config, compute),
        }
    }

    /// Number of parameter buckets created since the last invalidation.
    ///
    /// Grows by one per distinct argument list and only shrinks on
    /// `invalidate`.
    pub fn bucket_count(&self) -> usize {
        self.selector.bucket_count()
    }

    /// Clears counters and the timing window; cached results are kept.
    pub fn reset_stats(&self) {
        self.selector.reset_stats();
    }

    /// Returns a shared trait-object handle.
    pub fn shared(&self) -> Arc<dyn Select> {
        Arc::new(self.clone())
    }

    /// Returns true if both handles point at the same selector.
    pub fn ptr_eq(&self, other: &ParametricSelector) -> bool {
        self.selector.ptr_eq(&other.selector)
    }
}

impl Select for ParametricSelector {
    fn name(&self) -> &str {
        self.selector.name()
    }

    fn select(&self, state: &State, args: &[Value]) -> Result<Arc<Value>> {
        let bucket = if args.is_empty() {
            None
        } else {
            Some(fingerprint_args(args))
        };
        self.selector.call_in(bucket, state, args)
    }

    fn invalidate(&self, path: Option<&str>) {
        self.selector.invalidate(path);
    }

    fn stats(&self) -> SelectorStats {
        self.selector.stats()
    }

    fn cache_len(&self) -> usize {
        self.selector.cache_len()
    }
}
