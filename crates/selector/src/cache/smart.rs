//! Size- and TTL-aware cache.

use super::{Cache, CacheEntry, CacheStats, Counters};
use core::hash::Hash;
use core::mem::size_of;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_core::Value;
use tracing::debug;

/// Rough heap footprint of a cached value.
///
/// Estimates only need to be consistent, not exact: they rank entries and
/// enforce a coarse byte budget.
pub trait SizeEstimate {
    fn estimated_size(&self) -> usize;
}

impl SizeEstimate for Value {
    fn estimated_size(&self) -> usize {
        size_of::<Value>()
            + match self {
                Value::Null | Value::Bool(_) | Value::Number(_) => 0,
                Value::String(s) => s.len(),
                Value::Array(items) => items.iter().map(SizeEstimate::estimated_size).sum(),
                Value::Object(obj) => obj
                    .iter()
                    .map(|(k, v)| size_of::<String>() + k.len() + v.estimated_size())
                    .sum(),
            }
    }
}

impl SizeEstimate for String {
    fn estimated_size(&self) -> usize {
        size_of::<String>() + self.len()
    }
}

impl<T: SizeEstimate> SizeEstimate for Vec<T> {
    fn estimated_size(&self) -> usize {
        size_of::<Vec<T>>() + self.iter().map(SizeEstimate::estimated_size).sum::<usize>()
    }
}

impl<T: SizeEstimate> SizeEstimate for Arc<T> {
    fn estimated_size(&self) -> usize {
        (**self).estimated_size()
    }
}

/// Bounds for a [`SmartCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartCacheConfig {
    pub max_entries: usize,
    pub max_bytes: usize,
    /// TTL applied by `insert`; `insert_with_ttl` overrides it per entry.
    pub default_ttl: Option<Duration>,
}

impl Default for SmartCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_bytes: 64 * 1024 * 1024,
            default_ttl: None,
        }
    }
}

struct Slot<V> {
    entry: CacheEntry<V>,
    tick: u64,
}

/// Cache bounded by entry count and total estimated bytes.
///
/// Expired entries are dropped when looked up, by [`SmartCache::purge_expired`],
/// and before any live entry is evicted. Live entries are then evicted least
/// recently used first. A value larger than the whole byte budget is rejected.
///
/// The `*_at` methods take an explicit clock so expiry can be driven
/// deterministically.
pub struct SmartCache<K, V> {
    config: SmartCacheConfig,
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    tick: u64,
    total_bytes: usize,
    counters: Counters,
}

impl<K, V> SmartCache<K, V>
where
    K: Hash + Eq + Clone,
    V: SizeEstimate + Clone,
{
    pub fn new(config: SmartCacheConfig) -> Self {
        Self {
            config: SmartCacheConfig {
                max_entries: config.max_entries.max(1),
                ..config
            },
            entries: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
            total_bytes: 0,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> SmartCacheConfig {
        self.config
    }

    /// Sum of the estimated sizes of cached values.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Looks up `key` as of `now`.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.counters.misses += 1;
                return None;
            }
            Some(slot) => slot.entry.is_expired(now),
        };
        if expired {
            self.drop_entry(key);
            self.counters.expirations += 1;
            self.counters.misses += 1;
            return None;
        }

        let tick = self.next_tick();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.tick);
        slot.tick = tick;
        slot.entry.touch(now);
        self.order.insert(tick, key.clone());
        self.counters.hits += 1;
        Some(slot.entry.value.clone())
    }

    /// Stores `value` with an explicit TTL as of `now`.
    ///
    /// Returns `false` if the value alone exceeds the byte budget; nothing is
    /// stored or evicted in that case.
    pub fn insert_at(&mut self, key: K, value: V, ttl: Option<Duration>, now: Instant) -> bool {
        let size = value.estimated_size();
        if size > self.config.max_bytes {
            debug!(size, max_bytes = self.config.max_bytes, "rejecting oversized cache value");
            return false;
        }

        self.drop_entry(&key);
        self.make_room(size, now);

        let tick = self.next_tick();
        self.order.insert(tick, key.clone());
        self.total_bytes += size;
        self.entries.insert(
            key,
            Slot {
                entry: CacheEntry::new(value, size, ttl, now),
                tick,
            },
        );
        true
    }

    /// Stores `value` with a per-entry TTL.
    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) -> bool {
        self.insert_at(key, value, Some(ttl), Instant::now())
    }

    /// Drops every entry expired as of `now`, returning how many went.
    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.drop_entry(key);
        }
        self.counters.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Metadata of a live entry, without touching recency.
    pub fn entry(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn drop_entry(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        self.total_bytes -= slot.entry.size_bytes;
        Some(slot.entry.value)
    }

    fn fits(&self, incoming: usize) -> bool {
        self.entries.len() < self.config.max_entries
            && self.total_bytes + incoming <= self.config.max_bytes
    }

    /// Evicts until an `incoming`-byte value fits: expired entries first,
    /// then least recently used.
    fn make_room(&mut self, incoming: usize, now: Instant) {
        if self.fits(incoming) {
            return;
        }
        self.purge_expired_at(now);
        while !self.fits(incoming) {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&key) {
                self.total_bytes -= slot.entry.size_bytes;
                self.counters.evictions += 1;
            }
        }
    }
}

impl<K, V> Cache<K, V> for SmartCache<K, V>
where
    K: Hash + Eq + Clone,
    V: SizeEstimate + Clone,
{
    fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let now = Instant::now();
        let previous = self
            .entries
            .get(&key)
            .filter(|slot| !slot.entry.is_expired(now))
            .map(|slot| slot.entry.value.clone());
        self.insert_at(key, value, self.config.default_ttl, now);
        previous
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.drop_entry(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.total_bytes = 0;
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_entries: usize, max_bytes: usize) -> SmartCacheConfig {
        SmartCacheConfig {
            max_entries,
            max_bytes,
            default_ttl: None,
        }
    }

    fn text(len: usize) -> String {
        "x".repeat(len)
    }

    #[test]
    fn test_size_estimates() {
        let small = Value::from("ab");
        let nested = Value::array([Value::from("ab"), Value::from("ab")]);
        assert_eq!(small.estimated_size(), size_of::<Value>() + 2);
        assert!(nested.estimated_size() > 2 * small.estimated_size());
        assert_eq!(text(10).estimated_size(), size_of::<String>() + 10);
        assert_eq!(Arc::new(text(3)).estimated_size(), text(3).estimated_size());
    }

    #[test]
    fn test_entry_bound_evicts_lru() {
        let mut cache = SmartCache::new(config(2, usize::MAX));
        let now = Instant::now();
        cache.insert_at("a", text(1), None, now);
        cache.insert_at("b", text(1), None, now);
        cache.get_at(&"a", now);
        cache.insert_at("c", text(1), None, now);

        assert!(cache.entry(&"a").is_some());
        assert!(cache.entry(&"b").is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_byte_bound() {
        let unit = text(100).estimated_size();
        let mut cache = SmartCache::new(config(100, unit * 3));
        let now = Instant::now();
        for key in 0..5 {
            assert!(cache.insert_at(key, text(100), None, now));
            assert!(cache.total_bytes() <= unit * 3);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.entry(&0).is_none());
        assert!(cache.entry(&4).is_some());
    }

    #[test]
    fn test_oversized_value_rejected() {
        let mut cache = SmartCache::new(config(10, 64));
        let now = Instant::now();
        assert!(cache.insert_at(1, text(8), None, now));
        assert!(!cache.insert_at(2, text(1000), None, now));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_ttl_expiry_on_access() {
        let mut cache = SmartCache::new(config(10, usize::MAX));
        let now = Instant::now();
        cache.insert_at("k", text(1), Some(Duration::from_millis(10)), now);

        assert!(cache.get_at(&"k", now + Duration::from_millis(5)).is_some());
        assert!(cache.get_at(&"k", now + Duration::from_millis(10)).is_none());
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn test_expired_evicted_before_live() {
        let mut cache = SmartCache::new(config(2, usize::MAX));
        let now = Instant::now();
        cache.insert_at("live", text(1), None, now);
        cache.insert_at("short", text(1), Some(Duration::from_millis(1)), now);

        // "live" is older, but "short" has expired and goes first.
        let later = now + Duration::from_millis(2);
        cache.insert_at("new", text(1), None, later);

        assert!(cache.entry(&"live").is_some());
        assert!(cache.entry(&"short").is_none());
        let stats = cache.stats();
        assert_eq!((stats.evictions, stats.expirations), (0, 1));
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = SmartCache::new(config(10, usize::MAX));
        let now = Instant::now();
        for key in 0..4 {
            let ttl = (key % 2 == 0).then(|| Duration::from_millis(1));
            cache.insert_at(key, text(1), ttl, now);
        }
        assert_eq!(cache.purge_expired_at(now + Duration::from_millis(1)), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_default_ttl_applies_to_insert() {
        let mut cache = SmartCache::new(SmartCacheConfig {
            default_ttl: Some(Duration::from_secs(60)),
            ..SmartCacheConfig::default()
        });
        cache.insert("k", text(1));
        assert_eq!(cache.entry(&"k").and_then(|e| e.ttl), Some(Duration::from_secs(60)));
        assert_eq!(cache.insert("k", text(2)), Some(text(1)));
        assert_eq!(cache.total_bytes(), text(2).estimated_size());
    }
}
