//! Notification statistics.

use crate::subscription::SubscriptionType;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Number of per-change delivery latencies kept for the average.
pub const LATENCY_WINDOW: usize = 1000;

/// Snapshot of a manager's subscriptions and delivery counters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubscriptionStats {
    pub total_subscriptions: usize,
    pub active_subscriptions: usize,
    /// Paused or dead subscriptions.
    pub inactive_subscriptions: usize,
    pub by_type: BTreeMap<SubscriptionType, usize>,
    /// Callback invocations that completed.
    pub total_notifications: u64,
    /// Changes delivered through a batch flush.
    pub batched_notifications: u64,
    /// Callback invocations that panicked.
    pub failed_notifications: u64,
    pub avg_notification_latency_ms: f64,
    pub pending_batch_size: usize,
    pub batching_enabled: bool,
    pub batch_timeout_ms: u64,
}

/// Delivery counters plus a bounded latency window.
#[derive(Debug)]
pub(crate) struct NotificationMetrics {
    pub total: u64,
    pub batched: u64,
    pub failed: u64,
    latencies: VecDeque<Duration>,
}

impl Default for NotificationMetrics {
    fn default() -> Self {
        Self {
            total: 0,
            batched: 0,
            failed: 0,
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
        }
    }
}

impl NotificationMetrics {
    /// Records the time taken to deliver one change to all its subscribers.
    pub fn record_latency(&mut self, elapsed: Duration) {
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(elapsed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let total: f64 = self.latencies.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
        total / self.latencies.len() as f64
    }
}
