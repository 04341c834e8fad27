//! `AppStateContext`: one store, one selector factory, one subscription
//! manager, wired together.

use crate::config::TesseraConfig;
use crate::store::StateStore;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tessera_core::{Result, State, Value};
use tessera_reactive::{Callback, SelectorChange, SubscriptionId, SubscriptionManager, SubscriptionType};
use tessera_selector::{Dependency, SelectorFactory, SelectorStats};
use tracing::{debug, warn};

/// A selector re-evaluated after every update, with its last output.
struct Watch {
    selector: Dependency,
    last: Arc<Value>,
}

/// Application state plus the selector and subscription engines.
///
/// Create one per application (or per document) and pass it explicitly.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use tessera_context::{AppStateContext, TesseraConfig};
/// use tessera_core::{State, Value};
/// use tessera_selector::Select;
///
/// let context = AppStateContext::with_state(
///     TesseraConfig::default(),
///     State::from_iter([("ui", Value::object([("zoom", 1)]))]),
/// );
/// let zoom = context
///     .selectors()
///     .create_path_selector("ui.zoom", Value::from(1), Some("zoom"))
///     .unwrap();
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// context
///     .watch_selector(zoom.shared(), move |change| sink.lock().unwrap().push(change.new_value.clone()))
///     .unwrap();
///
/// context.update("ui.zoom", Value::from(2)).unwrap();
/// context.update("ui.zoom", Value::from(2)).unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![Value::from(2)]);
/// ```
pub struct AppStateContext {
    config: TesseraConfig,
    store: StateStore,
    selectors: SelectorFactory,
    subscriptions: SubscriptionManager,
    watches: Mutex<HashMap<String, Watch>>,
}

impl Default for AppStateContext {
    fn default() -> Self {
        Self::new(TesseraConfig::default())
    }
}

impl AppStateContext {
    /// Creates a context over an empty state.
    pub fn new(config: TesseraConfig) -> Self {
        Self::with_state(config, State::new())
    }

    pub fn with_state(config: TesseraConfig, state: State) -> Self {
        Self {
            config,
            store: StateStore::new(state),
            selectors: SelectorFactory::new(config.selectors),
            subscriptions: SubscriptionManager::with_config(config.subscriptions),
            watches: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> TesseraConfig {
        self.config
    }

    /// Current state snapshot.
    pub fn state(&self) -> State {
        self.store.snapshot()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn selectors(&self) -> &SelectorFactory {
        &self.selectors
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Writes `value` at `path`, notifies state subscribers and then
    /// re-evaluates watched selectors.
    ///
    /// Returns the number of callbacks invoked (0 while batching is on).
    pub fn update(&self, path: &str, value: Value) -> Result<usize> {
        let change = self.store.set(path, value)?;
        let delivered = self.subscriptions.notify_state_change([change]);
        Ok(delivered + self.refresh_watches())
    }

    /// Replaces the whole state; one change is emitted per top-level key
    /// that differs.
    pub fn replace_state(&self, state: State) -> usize {
        let changes = self.store.replace(state);
        let delivered = self.subscriptions.notify_state_change(changes);
        delivered + self.refresh_watches()
    }

    /// Subscribes `callback` to output changes of `selector`.
    ///
    /// The selector is evaluated once now to record its baseline; after each
    /// update it is re-run and subscribers are notified if the output
    /// changed. Watching the same selector name twice shares the evaluation.
    pub fn watch_selector<F>(&self, selector: Dependency, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&SelectorChange) + Send + Sync + 'static,
    {
        self.watch_selector_with(selector, Callback::new(callback))
    }

    /// Like [`AppStateContext::watch_selector`] with an explicit callback,
    /// e.g. [`Callback::weak`].
    pub fn watch_selector_with(
        &self,
        selector: Dependency,
        callback: Callback<SelectorChange>,
    ) -> Result<SubscriptionId> {
        let name = selector.name().to_string();
        let watched = self.watches.lock().contains_key(&name);
        if !watched {
            // Selector code runs without the watch lock held.
            let last = selector.select(&self.store.snapshot(), &[])?;
            self.watches
                .lock()
                .entry(name.clone())
                .or_insert_with(|| {
                    debug!(selector = %name, "watching selector");
                    Watch { selector, last }
                });
        }
        Ok(self.subscriptions.subscribe_selector(name, callback))
    }

    /// Removes a selector subscription. The selector stops being
    /// re-evaluated once its last subscriber is gone.
    pub fn unwatch(&self, id: SubscriptionId) -> bool {
        let Some(info) = self.subscriptions.subscription_info(id) else {
            return false;
        };
        if info.subscription_type != SubscriptionType::Selector || !self.subscriptions.unsubscribe(id) {
            return false;
        }
        let still_watched = self.subscriptions.subscription_ids().into_iter().any(|other| {
            self.subscriptions.subscription_info(other).is_some_and(|other| {
                other.subscription_type == SubscriptionType::Selector && other.path == info.path
            })
        });
        if !still_watched {
            self.watches.lock().remove(&info.path);
        }
        true
    }

    /// Names of the selectors currently re-evaluated on update, sorted.
    pub fn watched_selectors(&self) -> Vec<String> {
        let mut names: Vec<String> = self.watches.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Re-runs every watched selector against the current state and notifies
    /// subscribers of those whose output changed. Failing selectors are
    /// logged and keep their previous output.
    pub fn refresh_watches(&self) -> usize {
        let state = self.store.snapshot();
        let pending: Vec<(String, Dependency, Arc<Value>)> = self
            .watches
            .lock()
            .iter()
            .map(|(name, watch)| (name.clone(), Arc::clone(&watch.selector), Arc::clone(&watch.last)))
            .collect();

        // Selectors run without the watch lock held, so they may call back
        // into this context.
        let mut evaluated = Vec::new();
        for (name, selector, last) in pending {
            match selector.select(&state, &[]) {
                Ok(next) => {
                    if !Arc::ptr_eq(&next, &last) && *next != *last {
                        evaluated.push((name, last, next));
                    }
                }
                Err(err) => warn!(selector = %name, error = %err, "watched selector failed"),
            }
        }

        let mut changed = Vec::new();
        {
            let mut watches = self.watches.lock();
            for (name, seen, next) in evaluated {
                // Skip watches removed meanwhile or already advanced by a
                // concurrent refresh.
                let Some(watch) = watches.get_mut(&name) else {
                    continue;
                };
                if Arc::ptr_eq(&watch.last, &seen) {
                    watch.last = Arc::clone(&next);
                    changed.push((name, seen, next));
                }
            }
        }

        changed
            .into_iter()
            .map(|(name, old, new)| {
                self.subscriptions
                    .notify_selector_change(&name, (*old).clone(), (*new).clone())
            })
            .sum()
    }

    /// Stats of every selector created through [`AppStateContext::selectors`].
    pub fn selector_stats(&self) -> Vec<SelectorStats> {
        self.selectors.all_stats()
    }
}

impl core::fmt::Debug for AppStateContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppStateContext")
            .field("config", &self.config)
            .field("selectors", &self.selectors.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
