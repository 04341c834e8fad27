//! Selector statistics.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Snapshot of a selector's counters, shaped for metrics exporters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectorStats {
    pub name: String,
    pub total_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Hits as a percentage of calls (0.0 to 100.0).
    pub cache_hit_rate: f64,
    pub cache_size: usize,
    pub avg_execution_ms: f64,
    pub min_execution_ms: f64,
    pub max_execution_ms: f64,
}

/// Call counters plus a bounded window of miss-path execution times.
#[derive(Debug)]
pub(crate) struct Metrics {
    pub total_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    times: VecDeque<Duration>,
    window: usize,
}

impl Metrics {
    pub fn new(window: usize) -> Self {
        Self {
            total_calls: 0,
            cache_hits: 0,
            cache_misses: 0,
            times: VecDeque::with_capacity(window.min(1024)),
            window: window.max(1),
        }
    }

    /// Records one miss-path execution time, dropping the oldest sample
    /// once the window is full.
    pub fn record(&mut self, elapsed: Duration) {
        if self.times.len() == self.window {
            self.times.pop_front();
        }
        self.times.push_back(elapsed);
    }

    pub fn reset(&mut self) {
        self.total_calls = 0;
        self.cache_hits = 0;
        self.cache_misses = 0;
        self.times.clear();
    }

    pub fn snapshot(&self, name: &str, cache_size: usize) -> SelectorStats {
        let cache_hit_rate = if self.total_calls == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_calls as f64 * 100.0
        };

        let (avg, min, max) = if self.times.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let ms: Vec<f64> = self.times.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
            let sum: f64 = ms.iter().sum();
            let min = ms.iter().copied().fold(f64::INFINITY, f64::min);
            let max = ms.iter().copied().fold(0.0, f64::max);
            (sum / ms.len() as f64, min, max)
        };

        SelectorStats {
            name: name.to_string(),
            total_calls: self.total_calls,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            cache_hit_rate,
            cache_size,
            avg_execution_ms: avg,
            min_execution_ms: min,
            max_execution_ms: max,
        }
    }
}
