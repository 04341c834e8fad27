//! Strict least-recently-used cache.

use super::{Cache, CacheStats, Counters};
use core::hash::Hash;
use hashbrown::HashMap;
use std::collections::BTreeMap;

struct Slot<V> {
    value: V,
    tick: u64,
}

/// Capacity-bounded cache that evicts the entry accessed longest ago.
///
/// Every `get` and `insert` takes a fresh access tick. A `BTreeMap` from
/// tick to key keeps the eviction candidate at the front, so both lookup and
/// eviction are `O(log n)`.
pub struct LruCache<K, V> {
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    capacity: usize,
    tick: u64,
    counters: Counters,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            capacity: capacity.max(1),
            tick: 0,
            counters: Counters::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if `key` is cached, without touching recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the value without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) {
        if let Some((_, key)) = self.order.pop_first() {
            self.entries.remove(&key);
            self.counters.evictions += 1;
        }
    }
}

impl<K, V> Cache<K, V> for LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn get(&mut self, key: &K) -> Option<V> {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some(slot) => {
                self.order.remove(&slot.tick);
                slot.tick = tick;
                self.order.insert(tick, key.clone());
                self.counters.hits += 1;
                Some(slot.value.clone())
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let tick = self.next_tick();
        if let Some(slot) = self.entries.get_mut(&key) {
            self.order.remove(&slot.tick);
            slot.tick = tick;
            self.order.insert(tick, key);
            return Some(core::mem::replace(&mut slot.value, value));
        }
        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.order.insert(tick, key.clone());
        self.entries.insert(key, Slot { value, tick });
        None
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot.value)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }
}
