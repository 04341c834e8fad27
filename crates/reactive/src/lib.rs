//! Tessera Reactive - Change notification for application state.
//!
//! This crate routes state and selector changes to subscribers:
//!
//! - `SubscriptionManager`: registers subscriptions and delivers changes,
//!   immediately or in debounced batches
//! - `StateChange` / `SelectorChange`: the events delivered to callbacks
//! - `Callback`: a strong or weak-target handler
//! - `SubscriptionGuard`: unsubscribes on drop
//!
//! # Subscription kinds
//!
//! | Kind       | Matches                                      |
//! |------------|----------------------------------------------|
//! | `Path`     | exactly one path                             |
//! | `Pattern`  | glob over the changed path                   |
//! | `Deep`     | a path and everything below it               |
//! | `Selector` | output changes of a named selector           |
//! | `Change`   | every state change                           |
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use tessera_core::Value;
//! use tessera_reactive::{BatchConfig, StateChange, SubscriptionManager};
//!
//! let manager = SubscriptionManager::with_config(BatchConfig::enabled(16));
//! let zooms = Arc::new(Mutex::new(Vec::new()));
//! let sink = zooms.clone();
//! let _guard = manager.guard(manager.subscribe_to_path("ui.zoom", move |change| {
//!     sink.lock().unwrap().push(change.new_value.clone());
//! }));
//!
//! for zoom in 1..=5 {
//!     manager.notify_state_change([StateChange::new("ui.zoom", Value::from(zoom - 1), Value::from(zoom))]);
//! }
//! manager.flush_batch();
//! assert_eq!(*zooms.lock().unwrap(), vec![Value::from(5)]);
//! ```

mod batch;
mod callback;
mod change;
mod config;
mod guard;
mod manager;
mod stats;
mod subscription;

pub use callback::{Callback, Delivery};
pub use change::{ChangeEvent, ChangeType, SelectorChange, StateChange};
pub use config::{BatchConfig, DEFAULT_BATCH_TIMEOUT_MS};
pub use guard::SubscriptionGuard;
pub use manager::SubscriptionManager;
pub use stats::{SubscriptionStats, LATENCY_WINDOW};
pub use subscription::{
    SubscriptionId, SubscriptionInfo, SubscriptionState, SubscriptionType, ValueFilter,
};
