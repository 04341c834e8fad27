//! Subscription manager: registration, matching and delivery.
//!
//! # Matching
//!
//! A state change is matched in this order, and each subscription is
//! notified at most once per change:
//!
//! 1. PATH: `change.path == path`
//! 2. PATTERN: `path` is a glob that matches `change.path`
//! 3. DEEP: `change.path == path` or starts with `path + "."`
//! 4. CHANGE: always
//!
//! SELECTOR subscriptions never see state changes; they are driven by
//! [`SubscriptionManager::notify_selector_change`].
//!
//! # Delivery
//!
//! Matching happens under the registry lock; callbacks run after it is
//! released, so a callback may subscribe, unsubscribe or notify. A
//! panicking callback is logged and counted and does not affect other
//! subscribers. A callback whose weak target is gone marks its subscription
//! dead; dead subscriptions are skipped until
//! [`SubscriptionManager::cleanup_dead_subscriptions`] removes them.

use crate::batch::{BatchTimer, PendingBatch, Wake};
use crate::callback::{Callback, Delivery};
use crate::change::{ChangeEvent, SelectorChange, StateChange};
use crate::config::BatchConfig;
use crate::guard::SubscriptionGuard;
use crate::stats::{NotificationMetrics, SubscriptionStats};
use crate::subscription::{
    Subscription, SubscriptionId, SubscriptionInfo, SubscriptionState, SubscriptionType, Target,
    ValueFilter,
};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};
use tessera_core::{Error, GlobPattern, Result, Value};
use tracing::{debug, error, warn};

/// Path recorded for CHANGE subscriptions.
const ANY_PATH: &str = "*";

/// Events that can be routed to a subscription's callback.
trait Routed: ChangeEvent + Sized + 'static {
    fn callback(target: &Target) -> Option<&Callback<Self>>;
}

impl Routed for StateChange {
    fn callback(target: &Target) -> Option<&Callback<Self>> {
        match target {
            Target::State(callback) => Some(callback),
            Target::Selector(_) => None,
        }
    }
}

impl Routed for SelectorChange {
    fn callback(target: &Target) -> Option<&Callback<Self>> {
        match target {
            Target::Selector(callback) => Some(callback),
            Target::State(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Delivered,
    Dead,
    Failed,
}

struct PatternIndex {
    pattern: GlobPattern,
    ids: Vec<SubscriptionId>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    by_path: HashMap<String, Vec<SubscriptionId>>,
    by_pattern: HashMap<String, PatternIndex>,
    by_deep: HashMap<String, Vec<SubscriptionId>>,
    by_selector: HashMap<String, Vec<SubscriptionId>>,
    any_change: Vec<SubscriptionId>,
    batch: BatchConfig,
    pending: PendingBatch,
    metrics: NotificationMetrics,
}

impl Registry {
    fn insert(
        &mut self,
        kind: SubscriptionType,
        path: String,
        target: Target,
        filter: Option<ValueFilter>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId::new(self.next_id);

        match kind {
            SubscriptionType::Path => self.by_path.entry(path.clone()).or_default().push(id),
            SubscriptionType::Pattern => self
                .by_pattern
                .entry(path.clone())
                .or_insert_with(|| PatternIndex {
                    pattern: GlobPattern::new(&path),
                    ids: Vec::new(),
                })
                .ids
                .push(id),
            SubscriptionType::Deep => self.by_deep.entry(path.clone()).or_default().push(id),
            SubscriptionType::Selector => {
                self.by_selector.entry(path.clone()).or_default().push(id)
            }
            SubscriptionType::Change => self.any_change.push(id),
        }

        self.subscriptions
            .insert(id, Subscription::new(id, kind, path, target, filter));
        id
    }

    fn remove(&mut self, id: SubscriptionId) -> Option<Subscription> {
        let sub = self.subscriptions.remove(&id)?;
        let path = sub.path.as_str();
        match sub.kind {
            SubscriptionType::Path => unindex(&mut self.by_path, path, id),
            SubscriptionType::Deep => unindex(&mut self.by_deep, path, id),
            SubscriptionType::Selector => unindex(&mut self.by_selector, path, id),
            SubscriptionType::Pattern => {
                if let Some(index) = self.by_pattern.get_mut(path) {
                    index.ids.retain(|other| *other != id);
                    if index.ids.is_empty() {
                        self.by_pattern.remove(path);
                    }
                }
            }
            SubscriptionType::Change => self.any_change.retain(|other| *other != id),
        }
        Some(sub)
    }

    fn set_state(&mut self, id: SubscriptionId, from: &[SubscriptionState], to: SubscriptionState) -> bool {
        match self.subscriptions.get_mut(&id) {
            Some(sub) if from.contains(&sub.state) => {
                sub.state = to;
                true
            }
            _ => false,
        }
    }

    fn collect<E: Routed>(
        &self,
        ids: &[SubscriptionId],
        event: &E,
        seen: &mut HashSet<SubscriptionId>,
        out: &mut Vec<(SubscriptionId, Callback<E>)>,
    ) {
        for id in ids {
            let Some(sub) = self.subscriptions.get(id) else {
                continue;
            };
            if !sub.is_active() || !sub.accepts(event.new_value()) {
                continue;
            }
            if let Some(callback) = E::callback(&sub.target) {
                if seen.insert(*id) {
                    out.push((*id, callback.clone()));
                }
            }
        }
    }

    fn match_state(&self, change: &StateChange) -> Vec<(SubscriptionId, Callback<StateChange>)> {
        let path = change.path.as_str();
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        if let Some(ids) = self.by_path.get(path) {
            self.collect(ids, change, &mut seen, &mut out);
        }
        for index in self.by_pattern.values() {
            if index.pattern.matches(path) {
                self.collect(&index.ids, change, &mut seen, &mut out);
            }
        }
        if !self.by_deep.is_empty() {
            let prefixes = path
                .match_indices('.')
                .map(|(at, _)| &path[..at])
                .chain(core::iter::once(path));
            for prefix in prefixes {
                if let Some(ids) = self.by_deep.get(prefix) {
                    self.collect(ids, change, &mut seen, &mut out);
                }
            }
        }
        self.collect(&self.any_change, change, &mut seen, &mut out);
        out
    }

    fn match_selector(&self, change: &SelectorChange) -> Vec<(SubscriptionId, Callback<SelectorChange>)> {
        let mut out = Vec::new();
        if let Some(ids) = self.by_selector.get(&change.selector) {
            self.collect(ids, change, &mut HashSet::new(), &mut out);
        }
        out
    }

    /// Applies callback outcomes; returns how many were delivered.
    fn settle(&mut self, outcomes: &[(SubscriptionId, Outcome)], at: SystemTime) -> usize {
        let mut delivered = 0;
        for (id, outcome) in outcomes {
            match outcome {
                Outcome::Delivered => {
                    delivered += 1;
                    self.metrics.total += 1;
                    if let Some(sub) = self.subscriptions.get_mut(id) {
                        sub.record_delivery(at);
                    }
                }
                Outcome::Dead => {
                    if let Some(sub) = self.subscriptions.get_mut(id) {
                        sub.state = SubscriptionState::Dead;
                    }
                }
                Outcome::Failed => self.metrics.failed += 1,
            }
        }
        delivered
    }
}

fn unindex(index: &mut HashMap<String, Vec<SubscriptionId>>, path: &str, id: SubscriptionId) {
    if let Some(ids) = index.get_mut(path) {
        ids.retain(|other| *other != id);
        if ids.is_empty() {
            index.remove(path);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

fn invoke<E: Routed>(id: SubscriptionId, callback: &Callback<E>, event: &E) -> Outcome {
    match catch_unwind(AssertUnwindSafe(|| callback.invoke(event))) {
        Ok(Delivery::Delivered) => Outcome::Delivered,
        Ok(Delivery::Dead) => {
            debug!(subscription = %id, "subscription target dropped, marking dead");
            Outcome::Dead
        }
        Err(payload) => {
            error!(
                subscription = %id,
                panic = panic_message(payload.as_ref()),
                "subscription callback panicked"
            );
            Outcome::Failed
        }
    }
}

pub(crate) struct Inner {
    registry: Mutex<Registry>,
    timer: Arc<BatchTimer>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.timer.shutdown();
    }
}

fn run_flusher(timer: Arc<BatchTimer>, manager: Weak<Inner>) {
    while timer.wait() == Wake::Flush {
        let Some(inner) = manager.upgrade() else {
            break;
        };
        SubscriptionManager { inner }.deliver_pending();
    }
}

/// Routes state and selector changes to subscribers.
///
/// Cloning a `SubscriptionManager` creates a new handle to the **same**
/// registry. The batch flusher thread (started on the first batched
/// notification) exits once the last handle is dropped.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tessera_core::Value;
/// use tessera_reactive::{StateChange, SubscriptionManager};
///
/// let manager = SubscriptionManager::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let seen_clone = seen.clone();
/// manager.subscribe_to_deep_path("document", move |change| {
///     assert_eq!(change.path, "document.title");
///     seen_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// manager.notify_state_change([StateChange::new("document.title", Value::from("a"), Value::from("b"))]);
/// // No-op writes are dropped.
/// manager.notify_state_change([StateChange::new("document.title", Value::from("b"), Value::from("b"))]);
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<Inner>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Creates a manager that delivers immediately.
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    /// Creates a manager with the given batching behavior.
    pub fn with_config(batch: BatchConfig) -> Self {
        let registry = Registry {
            batch,
            ..Registry::default()
        };
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(registry),
                timer: Arc::new(BatchTimer::default()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    // ---- Registration ----

    /// Subscribes a state-change callback.
    ///
    /// `path` is an exact path, a glob pattern or a path prefix depending on
    /// `kind`; it is ignored for [`SubscriptionType::Change`]. Selector
    /// subscriptions take a [`SelectorChange`] callback and are rejected here;
    /// use [`SubscriptionManager::subscribe_selector`].
    pub fn subscribe(
        &self,
        kind: SubscriptionType,
        path: impl Into<String>,
        callback: Callback<StateChange>,
    ) -> Result<SubscriptionId> {
        self.register_state(kind, path.into(), callback, None)
    }

    /// Like [`SubscriptionManager::subscribe`], but only delivers changes
    /// whose new value passes `filter`.
    pub fn subscribe_filtered<F>(
        &self,
        kind: SubscriptionType,
        path: impl Into<String>,
        callback: Callback<StateChange>,
        filter: F,
    ) -> Result<SubscriptionId>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.register_state(kind, path.into(), callback, Some(Arc::new(filter)))
    }

    fn register_state(
        &self,
        kind: SubscriptionType,
        path: String,
        callback: Callback<StateChange>,
        filter: Option<ValueFilter>,
    ) -> Result<SubscriptionId> {
        let path = match kind {
            SubscriptionType::Selector => {
                return Err(Error::config(
                    "selector subscriptions take a SelectorChange callback",
                ))
            }
            SubscriptionType::Change => ANY_PATH.to_string(),
            _ => path,
        };
        let id = self
            .inner
            .registry
            .lock()
            .insert(kind, path, Target::State(callback), filter);
        Ok(id)
    }

    fn register_infallible(
        &self,
        kind: SubscriptionType,
        path: String,
        callback: Callback<StateChange>,
    ) -> SubscriptionId {
        self.inner
            .registry
            .lock()
            .insert(kind, path, Target::State(callback), None)
    }

    /// Notifies `callback` when exactly `path` changes.
    pub fn subscribe_to_path<F>(&self, path: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.register_infallible(SubscriptionType::Path, path.into(), Callback::new(callback))
    }

    /// Notifies `callback` when a changed path matches the glob `pattern`
    /// (`*` spans any characters including dots, `?` one character,
    /// `[..]` a class).
    pub fn subscribe_to_pattern<F>(&self, pattern: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.register_infallible(SubscriptionType::Pattern, pattern.into(), Callback::new(callback))
    }

    /// Notifies `callback` when `path` or anything below it changes.
    pub fn subscribe_to_deep_path<F>(&self, path: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.register_infallible(SubscriptionType::Deep, path.into(), Callback::new(callback))
    }

    /// Notifies `callback` of every state change.
    pub fn subscribe_to_any_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.register_infallible(SubscriptionType::Change, ANY_PATH.to_string(), Callback::new(callback))
    }

    /// Notifies `callback` when the selector registered as `selector`
    /// reports a new output.
    pub fn subscribe_to_selector<F>(&self, selector: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&SelectorChange) + Send + Sync + 'static,
    {
        self.subscribe_selector(selector, Callback::new(callback))
    }

    /// Selector subscription with an explicit (possibly weak) callback.
    pub fn subscribe_selector(
        &self,
        selector: impl Into<String>,
        callback: Callback<SelectorChange>,
    ) -> SubscriptionId {
        self.inner.registry.lock().insert(
            SubscriptionType::Selector,
            selector.into(),
            Target::Selector(callback),
            None,
        )
    }

    /// Returns a guard that unsubscribes `id` when dropped.
    pub fn guard(&self, id: SubscriptionId) -> SubscriptionGuard {
        SubscriptionGuard::new(self, id)
    }

    // ---- Lifecycle ----

    /// Removes a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.registry.lock().remove(id).is_some()
    }

    /// Stops deliveries to an active subscription.
    pub fn pause(&self, id: SubscriptionId) -> bool {
        self.inner.registry.lock().set_state(
            id,
            &[SubscriptionState::Active],
            SubscriptionState::Paused,
        )
    }

    /// Resumes a paused subscription. Dead subscriptions stay dead.
    pub fn resume(&self, id: SubscriptionId) -> bool {
        self.inner.registry.lock().set_state(
            id,
            &[SubscriptionState::Paused],
            SubscriptionState::Active,
        )
    }

    /// Retires a subscription; it receives nothing further and is removed by
    /// the next [`SubscriptionManager::cleanup_dead_subscriptions`].
    pub fn mark_dead(&self, id: SubscriptionId) -> bool {
        self.inner.registry.lock().set_state(
            id,
            &[SubscriptionState::Active, SubscriptionState::Paused],
            SubscriptionState::Dead,
        )
    }

    /// Removes every dead subscription and returns how many were removed.
    /// Paused subscriptions are kept.
    pub fn cleanup_dead_subscriptions(&self) -> usize {
        let mut registry = self.inner.registry.lock();
        let dead: Vec<SubscriptionId> = registry
            .subscriptions
            .values()
            .filter(|sub| sub.state == SubscriptionState::Dead)
            .map(|sub| sub.id)
            .collect();
        for id in &dead {
            registry.remove(*id);
        }
        if !dead.is_empty() {
            debug!(removed = dead.len(), "removed dead subscriptions");
        }
        dead.len()
    }

    /// Removes every subscription and discards pending batched changes.
    /// Ids are never reused.
    pub fn clear(&self) {
        let mut registry = self.inner.registry.lock();
        registry.subscriptions.clear();
        registry.by_path.clear();
        registry.by_pattern.clear();
        registry.by_deep.clear();
        registry.by_selector.clear();
        registry.any_change.clear();
        registry.pending.clear();
        drop(registry);
        self.inner.timer.disarm();
    }

    // ---- Notification ----

    /// Delivers state changes, one or many (`[change]`, a `Vec`, an
    /// `Option`, ...). Changes whose old and new values are equal are
    /// dropped.
    ///
    /// Returns the number of callbacks that completed. With batching
    /// enabled the changes are queued instead and 0 is returned.
    pub fn notify_state_change<I>(&self, changes: I) -> usize
    where
        I: IntoIterator<Item = StateChange>,
    {
        let changes: Vec<StateChange> = changes
            .into_iter()
            .filter(StateChange::has_actual_change)
            .collect();
        if changes.is_empty() {
            return 0;
        }

        {
            let mut registry = self.inner.registry.lock();
            if registry.batch.enabled {
                let timeout = registry.batch.timeout();
                for change in changes {
                    registry.pending.push(change);
                }
                drop(registry);
                self.schedule_flush(timeout);
                return 0;
            }
        }

        changes
            .iter()
            .map(|change| self.deliver_state(change, false))
            .sum()
    }

    /// Delivers a selector output transition to the selector's subscribers.
    /// Nothing is delivered if `old_value == new_value`.
    pub fn notify_selector_change(&self, selector: &str, old_value: Value, new_value: Value) -> usize {
        if old_value == new_value {
            return 0;
        }
        let change = SelectorChange::new(selector, old_value, new_value);
        let started = Instant::now();
        let targets = self.inner.registry.lock().match_selector(&change);
        self.deliver(&change, targets, started)
    }

    /// Delivers every pending batched change now and cancels the scheduled
    /// flush. Returns the number of changes delivered.
    pub fn flush_batch(&self) -> usize {
        self.inner.timer.disarm();
        self.deliver_pending()
    }

    /// Reconfigures batching. Turning batching off delivers whatever is
    /// pending.
    pub fn set_batching(&self, config: BatchConfig) {
        let disabling = {
            let mut registry = self.inner.registry.lock();
            let was_enabled = registry.batch.enabled;
            registry.batch = config;
            was_enabled && !config.enabled
        };
        if disabling {
            self.flush_batch();
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        self.inner.registry.lock().batch
    }

    fn schedule_flush(&self, timeout: Duration) {
        self.ensure_flusher();
        self.inner.timer.arm(Instant::now() + timeout);
    }

    fn ensure_flusher(&self) {
        if !self.inner.timer.claim_start() {
            return;
        }
        let timer = Arc::clone(&self.inner.timer);
        let manager = self.downgrade();
        let spawned = std::thread::Builder::new()
            .name("tessera-batch-flush".into())
            .spawn(move || run_flusher(timer, manager));
        if let Err(err) = spawned {
            self.inner.timer.release_start();
            warn!(error = %err, "failed to start batch flusher; call flush_batch to deliver");
        }
    }

    fn deliver_pending(&self) -> usize {
        let changes = self.inner.registry.lock().pending.drain();
        for change in &changes {
            self.deliver_state(change, true);
        }
        if !changes.is_empty() {
            debug!(changes = changes.len(), "flushed batched changes");
        }
        changes.len()
    }

    fn deliver_state(&self, change: &StateChange, batched: bool) -> usize {
        let started = Instant::now();
        let targets = {
            let mut registry = self.inner.registry.lock();
            if batched {
                registry.metrics.batched += 1;
            }
            registry.match_state(change)
        };
        self.deliver(change, targets, started)
    }

    fn deliver<E: Routed>(
        &self,
        event: &E,
        targets: Vec<(SubscriptionId, Callback<E>)>,
        started: Instant,
    ) -> usize {
        let outcomes: Vec<(SubscriptionId, Outcome)> = targets
            .iter()
            .map(|(id, callback)| (*id, invoke(*id, callback, event)))
            .collect();

        let mut registry = self.inner.registry.lock();
        let delivered = registry.settle(&outcomes, SystemTime::now());
        registry.metrics.record_latency(started.elapsed());
        delivered
    }

    // ---- Introspection ----

    pub fn subscription_info(&self, id: SubscriptionId) -> Option<SubscriptionInfo> {
        self.inner.registry.lock().subscriptions.get(&id).map(Subscription::info)
    }

    /// Ids of every registered subscription, in registration order.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<SubscriptionId> =
            self.inner.registry.lock().subscriptions.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of registered subscriptions, dead ones included.
    pub fn len(&self) -> usize {
        self.inner.registry.lock().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_batch_size(&self) -> usize {
        self.inner.registry.lock().pending.len()
    }

    pub fn stats(&self) -> SubscriptionStats {
        let registry = self.inner.registry.lock();
        let mut by_type: BTreeMap<SubscriptionType, usize> =
            SubscriptionType::ALL.iter().map(|kind| (*kind, 0)).collect();
        let mut active = 0;
        for sub in registry.subscriptions.values() {
            *by_type.entry(sub.kind).or_default() += 1;
            if sub.is_active() {
                active += 1;
            }
        }
        let total = registry.subscriptions.len();
        SubscriptionStats {
            total_subscriptions: total,
            active_subscriptions: active,
            inactive_subscriptions: total - active,
            by_type,
            total_notifications: registry.metrics.total,
            batched_notifications: registry.metrics.batched,
            failed_notifications: registry.metrics.failed,
            avg_notification_latency_ms: registry.metrics.avg_latency_ms(),
            pending_batch_size: registry.pending.len(),
            batching_enabled: registry.batch.enabled,
            batch_timeout_ms: registry.batch.timeout_ms,
        }
    }
}

impl core::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("subscriptions", &self.len())
            .field("batch", &self.batch_config())
            .finish()
    }
}
