//! Tessera Context - Application state wiring for Tessera.
//!
//! This crate ties the engines together:
//!
//! - `StateStore`: the current state snapshot
//! - `AppStateContext`: store + `SelectorFactory` + `SubscriptionManager`,
//!   with selector watches that turn selector output changes into
//!   notifications
//! - `TesseraConfig`: serde-loadable settings for both engines

mod config;
mod context;
mod store;

pub use config::TesseraConfig;
pub use context::AppStateContext;
pub use store::StateStore;
