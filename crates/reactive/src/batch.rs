//! Batched delivery: the pending queue and the debounce timer.

use crate::change::StateChange;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// Changes waiting for the next flush, one per path.
///
/// A later change to a queued path replaces the earlier one but keeps the
/// path's original position, so flushes deliver paths in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct PendingBatch {
    order: Vec<String>,
    changes: HashMap<String, StateChange>,
}

impl PendingBatch {
    pub fn push(&mut self, change: StateChange) {
        if !self.changes.contains_key(&change.path) {
            self.order.push(change.path.clone());
        }
        self.changes.insert(change.path.clone(), change);
    }

    /// Removes and returns every queued change in first-seen order.
    pub fn drain(&mut self) -> Vec<StateChange> {
        let mut changes = core::mem::take(&mut self.changes);
        self.order
            .drain(..)
            .filter_map(|path| changes.remove(&path))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.changes.clear();
    }
}

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Instant>,
    started: bool,
    shutdown: bool,
}

/// What the flusher thread should do next.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    Flush,
    Shutdown,
}

/// A single re-armable deadline shared with one flusher thread.
///
/// `arm` replaces any pending deadline under the timer mutex, so a
/// reschedule always cancels the previous flush; at most one flush is ever
/// outstanding per manager.
#[derive(Debug, Default)]
pub(crate) struct BatchTimer {
    state: Mutex<TimerState>,
    signal: Condvar,
}

impl BatchTimer {
    /// Sets (or pushes back) the flush deadline.
    pub fn arm(&self, deadline: Instant) {
        self.state.lock().deadline = Some(deadline);
        self.signal.notify_one();
    }

    /// Cancels the pending flush, if any.
    pub fn disarm(&self) {
        self.state.lock().deadline = None;
        self.signal.notify_one();
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().deadline.is_some()
    }

    /// Marks the flusher as started; returns false if it already was.
    pub fn claim_start(&self) -> bool {
        let mut state = self.state.lock();
        !core::mem::replace(&mut state.started, true)
    }

    /// Allows a later `claim_start` to succeed again.
    pub fn release_start(&self) {
        self.state.lock().started = false;
    }

    /// Stops the flusher thread.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        state.deadline = None;
        drop(state);
        self.signal.notify_all();
    }

    /// Blocks until the armed deadline passes or the timer is shut down.
    /// The deadline is consumed when `Wake::Flush` is returned.
    pub fn wait(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return Wake::Shutdown;
            }
            let deadline = state.deadline;
            match deadline {
                None => self.signal.wait(&mut state),
                Some(deadline) if Instant::now() >= deadline => {
                    state.deadline = None;
                    return Wake::Flush;
                }
                Some(deadline) => {
                    self.signal.wait_until(&mut state, deadline);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tessera_core::Value;

    #[test]
    fn test_pending_batch_coalesces_by_path() {
        let mut batch = PendingBatch::default();
        for i in 0..5 {
            batch.push(StateChange::new("ui.zoom", Value::from(i), Value::from(i + 1)));
        }
        batch.push(StateChange::new("document.title", Value::Null, Value::from("t")));
        batch.push(StateChange::new("ui.zoom", Value::from(9), Value::from(10)));
        assert_eq!(batch.len(), 2);

        let drained = batch.drain();
        assert!(batch.is_empty());
        assert_eq!(drained[0].path, "ui.zoom");
        assert_eq!(drained[0].new_value, Value::from(10));
        assert_eq!(drained[1].path, "document.title");
    }

    #[test]
    fn test_timer_fires_after_deadline() {
        let timer = BatchTimer::default();
        let started = Instant::now();
        timer.arm(started + Duration::from_millis(20));
        assert_eq!(timer.wait(), Wake::Flush);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let timer = Arc::new(BatchTimer::default());
        let started = Instant::now();
        timer.arm(started + Duration::from_secs(5));

        let waiter = {
            let timer = Arc::clone(&timer);
            std::thread::spawn(move || timer.wait())
        };
        timer.arm(started + Duration::from_millis(30));
        assert_eq!(waiter.join().unwrap(), Wake::Flush);

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_wakes_waiter() {
        let timer = Arc::new(BatchTimer::default());
        let waiter = {
            let timer = Arc::clone(&timer);
            std::thread::spawn(move || timer.wait())
        };
        timer.shutdown();
        assert_eq!(waiter.join().unwrap(), Wake::Shutdown);
    }

    #[test]
    fn test_claim_start_once() {
        let timer = BatchTimer::default();
        assert!(timer.claim_start());
        assert!(!timer.claim_start());
        timer.release_start();
        assert!(timer.claim_start());
    }
}
