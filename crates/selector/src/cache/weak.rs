//! Cache of weak references.

use super::{Cache, CacheStats, Counters};
use core::hash::Hash;
use hashbrown::HashMap;
use std::sync::{Arc, Weak};

/// Maps keys to values owned elsewhere.
///
/// The cache holds only `Weak` handles, so it never extends a value's
/// lifetime. A lookup whose referent has been dropped removes the dead entry
/// and counts as an expiration plus a miss.
pub struct WeakCache<K, V> {
    entries: HashMap<K, Weak<V>>,
    counters: Counters,
}

impl<K, V> Default for WeakCache<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> WeakCache<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Drops every entry whose referent is gone, returning how many went.
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        let purged = before - self.entries.len();
        self.counters.expirations += purged as u64;
        purged
    }

    /// Number of entries whose referent is still alive.
    pub fn live_len(&self) -> usize {
        self.entries.values().filter(|w| w.strong_count() > 0).count()
    }
}

impl<K, V> Cache<K, Arc<V>> for WeakCache<K, V>
where
    K: Hash + Eq,
{
    fn get(&mut self, key: &K) -> Option<Arc<V>> {
        let upgraded = self.entries.get(key).map(Weak::upgrade);
        match upgraded {
            Some(Some(value)) => {
                self.counters.hits += 1;
                Some(value)
            }
            Some(None) => {
                self.entries.remove(key);
                self.counters.expirations += 1;
                self.counters.misses += 1;
                None
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.entries
            .insert(key, Arc::downgrade(&value))
            .and_then(|previous| previous.upgrade())
    }

    fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        self.entries.remove(key).and_then(|weak| weak.upgrade())
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Includes entries whose referent died but have not been purged yet.
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }
}
