//! Cache entry bookkeeping shared by the eviction policies.

use std::time::{Duration, Instant};

/// A cached value plus the metadata eviction policies rank it by.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub last_access: Instant,
    pub access_count: u64,
    /// Estimated heap footprint, or 0 when the policy does not track size.
    pub size_bytes: usize,
    /// Lifetime measured from `created_at`. `None` never expires.
    pub ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry first seen at `now`.
    pub fn new(value: V, size_bytes: usize, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            created_at: now,
            last_access: now,
            access_count: 0,
            size_bytes,
            ttl,
        }
    }

    /// Returns true once `ttl` has elapsed since creation.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.created_at) >= ttl,
            None => false,
        }
    }

    /// Records an access.
    #[inline]
    pub fn touch(&mut self, now: Instant) {
        self.last_access = now;
        self.access_count += 1;
    }

    /// Time since creation.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}
