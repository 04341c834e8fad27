//! Pluggable caches with explicit eviction policies.
//!
//! These are opt-in building blocks for callers that need strict recency,
//! size or TTL bounds. [`crate::Selector`] keeps its own FIFO-bounded map and
//! does not use them.
//!
//! - [`LruCache`]: strict least-recently-used, bounded by entry count.
//! - [`SmartCache`]: bounded by entry count and estimated bytes, with TTLs.
//! - [`WeakCache`]: holds `Weak` references only.

mod entry;
mod lru;
mod smart;
mod weak;

pub use entry::CacheEntry;
pub use lru::LruCache;
pub use smart::{SizeEstimate, SmartCache, SmartCacheConfig};
pub use weak::WeakCache;

use serde::Serialize;

/// Counters reported by every cache policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Entries dropped because their TTL or referent ran out.
    pub expirations: u64,
    pub len: usize,
}

impl CacheStats {
    /// Hits as a fraction of lookups (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Hit/miss/eviction counters shared by the policies.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl Counters {
    pub fn snapshot(&self, len: usize) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
            len,
        }
    }
}

/// Common interface of the cache policies.
///
/// `get` takes `&mut self` because a lookup updates recency and counters.
pub trait Cache<K, V> {
    fn get(&mut self, key: &K) -> Option<V>;

    /// Stores `value`, returning the value previously under `key`.
    fn insert(&mut self, key: K, value: V) -> Option<V>;

    fn remove(&mut self, key: &K) -> Option<V>;

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 9,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.9).abs() < 1e-9);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_policies_behind_trait_object() {
        let mut caches: Vec<Box<dyn Cache<u32, String>>> = vec![
            Box::new(LruCache::new(2)),
            Box::new(SmartCache::new(SmartCacheConfig::default())),
        ];
        for cache in &mut caches {
            cache.insert(1, "one".to_string());
            assert_eq!(cache.get(&1).as_deref(), Some("one"));
            assert_eq!(cache.get(&2), None);
            assert_eq!(cache.remove(&1).as_deref(), Some("one"));
            assert!(cache.is_empty());
            let stats = cache.stats();
            assert_eq!((stats.hits, stats.misses), (1, 1));
        }
    }
}
