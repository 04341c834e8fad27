//! Memoized selectors.
//!
//! A [`Selector`] wraps a derivation from [`State`] (plus positional
//! arguments) to a [`Value`] and caches results by [`SelectorCacheKey`].
//!
//! # Invariants
//!
//! 1. A cache hit never re-runs user code, dependencies included.
//! 2. Failed computations are never cached; the error reaches the caller.
//! 3. After any call returns, each cache holds at most `max_cache_size`
//!    entries. Overflow drops the oldest half by insertion order (FIFO), not
//!    by recency.
//! 4. `invalidate` clears everything; the path argument is accepted for
//!    callers that know what changed, but does not narrow the clear.
//!
//! The cache and counters sit behind a mutex. User code runs outside it, so
//! dependencies and concurrent callers never deadlock; two threads missing
//! the same key may both compute, and the later insert wins.

use crate::config::SelectorConfig;
use crate::key::SelectorCacheKey;
use crate::stats::{Metrics, SelectorStats};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tessera_core::{Result, State, Value};
use tracing::debug;

/// Derivation run on a cache miss when the selector has no dependencies.
pub type ComputeFn = dyn Fn(&State, &[Value]) -> Result<Value> + Send + Sync;

/// Derivation fed with dependency results followed by the call arguments.
pub type CombineFn = dyn Fn(&[Arc<Value>], &[Value]) -> Result<Value> + Send + Sync;

/// Anything that can be called like a selector.
///
/// Implemented by [`Selector`] and [`crate::ParametricSelector`]; used as the
/// dependency type so selectors compose.
pub trait Select: Send + Sync {
    /// Registered name of the selector.
    fn name(&self) -> &str;

    /// Evaluates against a state snapshot and call arguments.
    fn select(&self, state: &State, args: &[Value]) -> Result<Arc<Value>>;

    /// Drops cached results. See the module docs for the meaning of `path`.
    fn invalidate(&self, path: Option<&str>);

    /// Current counters.
    fn stats(&self) -> SelectorStats;

    /// Number of cached results across all buckets.
    fn cache_len(&self) -> usize;
}

/// Shared handle to any selector, used for dependencies.
pub type Dependency = Arc<dyn Select>;

enum Compute {
    Direct(Box<ComputeFn>),
    Combined {
        dependencies: Vec<Dependency>,
        combine: Box<CombineFn>,
    },
}

impl Compute {
    fn run(&self, state: &State, args: &[Value]) -> Result<Value> {
        match self {
            Compute::Direct(f) => f(state, args),
            Compute::Combined {
                dependencies,
                combine,
            } => {
                let mut inputs = Vec::with_capacity(dependencies.len());
                for dependency in dependencies {
                    inputs.push(dependency.select(state, args)?);
                }
                combine(&inputs, args)
            }
        }
    }
}

/// Insertion-ordered result map with "drop the oldest half" overflow.
#[derive(Debug, Default)]
pub(crate) struct ResultCache {
    entries: HashMap<SelectorCacheKey, Arc<Value>>,
    order: VecDeque<SelectorCacheKey>,
}

impl ResultCache {
    pub fn get(&self, key: &SelectorCacheKey) -> Option<Arc<Value>> {
        self.entries.get(key).cloned()
    }

    /// Stores a result and returns how many entries were evicted.
    pub fn insert(&mut self, key: SelectorCacheKey, value: Arc<Value>, max_size: usize) -> usize {
        if self.entries.insert(key, value).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() <= max_size {
            return 0;
        }
        let evict = self.entries.len() / 2;
        for _ in 0..evict {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        evict
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Mutable selector state: the shared cache, per-parameter buckets and
/// counters.
#[derive(Debug)]
struct Memo {
    shared: ResultCache,
    buckets: HashMap<u64, ResultCache>,
    metrics: Metrics,
}

impl Memo {
    fn cache_mut(&mut self, bucket: Option<u64>) -> &mut ResultCache {
        match bucket {
            None => &mut self.shared,
            Some(id) => self.buckets.entry(id).or_default(),
        }
    }

    fn len(&self) -> usize {
        self.shared.len() + self.buckets.values().map(ResultCache::len).sum::<usize>()
    }
}

struct SelectorInner {
    name: String,
    config: SelectorConfig,
    compute: Compute,
    memo: Mutex<Memo>,
}

/// A memoized derivation over application state.
///
/// Cloning a `Selector` creates a new handle to the **same** cache.
///
/// # Example
///
/// ```rust
/// use tessera_core::{State, Value};
/// use tessera_selector::{Select, Selector};
///
/// let title = Selector::new("title", |state: &State, _args: &[Value]| {
///     Ok(state.get_path("document.title").cloned().unwrap_or(Value::Null))
/// });
///
/// let state = State::from_iter([("document", Value::object([("title", "Q3")]))]);
/// assert_eq!(*title.call(&state).unwrap(), Value::from("Q3"));
/// assert_eq!(*title.call(&state).unwrap(), Value::from("Q3"));
/// assert_eq!(title.stats().cache_hits, 1);
/// ```
#[derive(Clone)]
pub struct Selector {
    inner: Arc<SelectorInner>,
}

impl Selector {
    /// Creates a selector without dependencies using the default config.
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&State, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::with_config(name, SelectorConfig::default(), compute)
    }

    /// Creates a selector without dependencies.
    pub fn with_config<F>(name: impl Into<String>, config: SelectorConfig, compute: F) -> Self
    where
        F: Fn(&State, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_parts(name.into(), config, Compute::Direct(Box::new(compute)))
    }

    /// Creates a selector whose combining function receives the results of
    /// `dependencies` (evaluated in order, each with its own memoization)
    /// followed by the call arguments.
    pub fn combine<F>(
        name: impl Into<String>,
        config: SelectorConfig,
        dependencies: Vec<Dependency>,
        combine: F,
    ) -> Self
    where
        F: Fn(&[Arc<Value>], &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self::from_parts(
            name.into(),
            config,
            Compute::Combined {
                dependencies,
                combine: Box::new(combine),
            },
        )
    }

    fn from_parts(name: String, config: SelectorConfig, compute: Compute) -> Self {
        let memo = Memo {
            shared: ResultCache::default(),
            buckets: HashMap::new(),
            metrics: Metrics::new(config.timing_window),
        };
        Self {
            inner: Arc::new(SelectorInner {
                name,
                config,
                compute,
                memo: Mutex::new(memo),
            }),
        }
    }

    /// Evaluates with no extra arguments.
    pub fn call(&self, state: &State) -> Result<Arc<Value>> {
        self.select(state, &[])
    }

    /// Returns a shared trait-object handle, e.g. for use as a dependency.
    pub fn shared(&self) -> Dependency {
        Arc::new(self.clone())
    }

    /// Returns the configuration this selector was built with.
    pub fn config(&self) -> SelectorConfig {
        self.inner.config
    }

    /// Clears counters and the timing window; cached results are kept.
    pub fn reset_stats(&self) {
        self.inner.memo.lock().metrics.reset();
    }

    /// Number of parameter buckets created so far.
    pub(crate) fn bucket_count(&self) -> usize {
        self.inner.memo.lock().buckets.len()
    }

    /// Returns true if both handles point at the same selector.
    pub fn ptr_eq(&self, other: &Selector) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs a memoized call against the shared cache (`bucket == None`) or
    /// against one parameter bucket.
    pub(crate) fn call_in(
        &self,
        bucket: Option<u64>,
        state: &State,
        args: &[Value],
    ) -> Result<Arc<Value>> {
        let key = SelectorCacheKey::new(state, args);
        {
            let mut memo = self.inner.memo.lock();
            memo.metrics.total_calls += 1;
            let cached = memo.cache_mut(bucket).get(&key);
            if let Some(hit) = cached {
                memo.metrics.cache_hits += 1;
                return Ok(hit);
            }
            memo.metrics.cache_misses += 1;
        }

        let started = Instant::now();
        let value = Arc::new(self.inner.compute.run(state, args)?);
        let elapsed = started.elapsed();

        let mut memo = self.inner.memo.lock();
        memo.metrics.record(elapsed);
        let evicted = memo
            .cache_mut(bucket)
            .insert(key, Arc::clone(&value), self.inner.config.cache_bound());
        if evicted > 0 {
            debug!(selector = %self.inner.name, evicted, "selector cache overflow");
        }
        Ok(value)
    }
}

impl Select for Selector {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn select(&self, state: &State, args: &[Value]) -> Result<Arc<Value>> {
        self.call_in(None, state, args)
    }

    fn invalidate(&self, path: Option<&str>) {
        let mut memo = self.inner.memo.lock();
        let dropped = memo.len();
        memo.shared.clear();
        memo.buckets.clear();
        debug!(selector = %self.inner.name, ?path, dropped, "selector cache invalidated");
    }

    fn stats(&self) -> SelectorStats {
        let memo = self.inner.memo.lock();
        memo.metrics.snapshot(&self.inner.name, memo.len())
    }

    fn cache_len(&self) -> usize {
        self.inner.memo.lock().len()
    }
}

impl core::fmt::Debug for Selector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Selector")
            .field("name", &self.inner.name)
            .field("cache_len", &self.cache_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_core::Error;

    fn counting(name: &str, calls: Arc<AtomicUsize>) -> Selector {
        Selector::new(name, move |state: &State, args: &[Value]| {
            calls.fetch_add(1, Ordering::SeqCst);
            let zoom = state.get_path("ui.zoom").cloned().unwrap_or(Value::Null);
            Ok(Value::array([zoom, Value::from(args.len())]))
        })
    }

    fn ui(zoom: i64) -> State {
        State::from_iter([("ui", Value::object([("zoom", zoom)]))])
    }

    #[test]
    fn test_hit_does_not_recompute() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = counting("zoom", calls.clone());
        let state = ui(1);

        let first = selector.call(&state).unwrap();
        let second = selector.call(&state).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = selector.stats();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert!((stats.cache_hit_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_state_misses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = counting("zoom", calls.clone());

        selector.call(&ui(1)).unwrap();
        selector.call(&ui(2)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(selector.cache_len(), 2);
    }

    #[test]
    fn test_args_are_part_of_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = counting("zoom", calls.clone());
        let state = ui(1);

        selector.select(&state, &[Value::from("a")]).unwrap();
        selector.select(&state, &[Value::from("b")]).unwrap();
        selector.select(&state, &[Value::from("a")]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_errors_propagate_and_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();
        let selector = Selector::new("failing", move |_: &State, _: &[Value]| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            Err(Error::computation("failing", "no data"))
        });
        let state = ui(1);

        assert!(selector.call(&state).is_err());
        assert!(selector.call(&state).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(selector.cache_len(), 0);
    }

    #[test]
    fn test_eviction_drops_oldest_half() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = SelectorConfig::default().with_max_cache_size(4);
        let calls_in = calls.clone();
        let selector = Selector::with_config("bounded", config, move |_: &State, args: &[Value]| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            Ok(args[0].clone())
        });
        let state = ui(1);

        for i in 0..5 {
            selector.select(&state, &[Value::from(i)]).unwrap();
        }
        // 5 > 4 so the two oldest (0, 1) were dropped.
        assert_eq!(selector.cache_len(), 3);

        selector.select(&state, &[Value::from(4)]).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        selector.select(&state, &[Value::from(0)]).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_invalidate_clears_regardless_of_path() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = counting("zoom", calls.clone());
        let state = ui(1);

        selector.call(&state).unwrap();
        selector.invalidate(Some("document.title"));
        assert_eq!(selector.cache_len(), 0);

        selector.call(&state).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dependencies_feed_combiner_in_order() {
        let zoom = Selector::new("zoom", |state: &State, _: &[Value]| {
            Ok(state.get_path("ui.zoom").cloned().unwrap_or(Value::Null))
        });
        let title = Selector::new("title", |state: &State, _: &[Value]| {
            Ok(state.get_path("document.title").cloned().unwrap_or(Value::Null))
        });
        let combined = Selector::combine(
            "label",
            SelectorConfig::default(),
            vec![title.shared(), zoom.shared()],
            |inputs: &[Arc<Value>], args: &[Value]| {
                let mut out = vec![(*inputs[0]).clone(), (*inputs[1]).clone()];
                out.extend(args.iter().cloned());
                Ok(Value::Array(out))
            },
        );

        let state = ui(3).with("document", Value::object([("title", "Q3")]));
        let result = combined.select(&state, &[Value::from("x")]).unwrap();
        assert_eq!(*result, Value::array([Value::from("Q3"), Value::from(3), Value::from("x")]));

        // Hit on the combined selector does not touch dependencies.
        combined.select(&state, &[Value::from("x")]).unwrap();
        assert_eq!(zoom.stats().total_calls, 1);
        assert_eq!(title.stats().total_calls, 1);
    }

    #[test]
    fn test_reset_stats_keeps_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = counting("zoom", calls.clone());
        let state = ui(1);
        selector.call(&state).unwrap();
        selector.reset_stats();

        assert_eq!(selector.stats().total_calls, 0);
        selector.call(&state).unwrap();
        assert_eq!(selector.stats().cache_hits, 1);
    }

    #[test]
    fn test_concurrent_calls_share_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = counting("zoom", calls.clone());
        let state = ui(7);
        selector.call(&state).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let selector = selector.clone();
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        selector.call(&state).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(selector.stats().cache_hits, 400);
    }

    #[test]
    fn test_result_cache_never_exceeds_bound() {
        let mut cache = ResultCache::default();
        let state = ui(1);
        for i in 0..1000 {
            let key = SelectorCacheKey::new(&state, &[Value::from(i)]);
            cache.insert(key, Arc::new(Value::Null), 100);
            assert!(cache.len() <= 100);
        }
    }
}
