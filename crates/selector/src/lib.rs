//! Tessera Selector - Memoized derivations over application state.
//!
//! This crate provides the read side of Tessera:
//!
//! - `Selector`: a memoized function of (`State`, args), optionally composed
//!   from dependency selectors
//! - `ParametricSelector`: a selector whose cache is partitioned by call
//!   arguments
//! - `SelectorFactory`: builders for path, filter, map, aggregation, sort and
//!   computed selectors with name-based de-duplication
//! - `cache`: opt-in LRU, size/TTL-aware and weak-reference caches
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{State, Value};
//! use tessera_selector::{Select, SelectorFactory};
//!
//! let factory = SelectorFactory::default();
//! let elements = factory
//!     .create_path_selector("elements", Value::Array(vec![]), None)
//!     .unwrap();
//! let texts = factory
//!     .create_filter_selector(
//!         elements.shared(),
//!         |e| Ok(e.get("type") == Some(&Value::from("text"))),
//!         Some("texts"),
//!     )
//!     .unwrap();
//!
//! let state = State::from_iter([(
//!     "elements",
//!     Value::array([
//!         Value::object([("type", "text")]),
//!         Value::object([("type", "image")]),
//!     ]),
//! )]);
//!
//! let first = texts.call(&state).unwrap();
//! let second = texts.call(&state).unwrap();
//! assert_eq!(first, second);
//! assert_eq!(texts.stats().cache_hits, 1);
//! ```

pub mod cache;
mod config;
mod factory;
mod key;
mod parametric;
mod selector;
mod stats;

pub use config::{SelectorConfig, DEFAULT_MAX_CACHE_SIZE, DEFAULT_TIMING_WINDOW};
pub use factory::{Aggregate, Predicate, SelectorFactory, SortKey, Transform};
pub use key::SelectorCacheKey;
pub use parametric::ParametricSelector;
pub use selector::{CombineFn, ComputeFn, Dependency, Select, Selector};
pub use stats::SelectorStats;
