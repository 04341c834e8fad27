//! Tessera Core - Value model and state snapshots for Tessera.
//!
//! This crate provides the foundational types shared by the selector and
//! subscription engines:
//!
//! - `Value`: JSON-like nodes of the application state tree
//! - `State`: an immutable, fingerprinted snapshot of the top-level mapping
//! - `ValuePath`: parsed dot-separated paths (`elements.5.status`)
//! - `pattern_match`: glob matching for path patterns
//! - `Error`: error types for selector computations and state access
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{State, Value};
//!
//! let state = State::from_iter([
//!     ("document", Value::object([("title", "Q3 report")])),
//!     ("elements", Value::array([Value::object([("type", "text")])])),
//! ]);
//!
//! assert_eq!(state.get_path("document.title"), Some(&Value::from("Q3 report")));
//!
//! let (next, old) = state.set_path("document.title", "Q4 report".into()).unwrap();
//! assert_eq!(old, Value::from("Q3 report"));
//! assert_ne!(state.fingerprint(), next.fingerprint());
//! ```

mod error;
pub mod fingerprint;
pub mod path;
pub mod pattern_match;
mod state;
mod value;

pub use error::{Error, Result};
pub use fingerprint::{fingerprint_args, fingerprint_value};
pub use path::{Segment, ValuePath};
pub use pattern_match::GlobPattern;
pub use state::State;
pub use value::{Object, Value};
