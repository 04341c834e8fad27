//! Cache keys for selector results.

use tessera_core::{fingerprint_args, State, Value};

/// Identifies one selector invocation: which state snapshot, which arguments.
///
/// Derived from the whole top-level state fingerprint, so any top-level
/// change produces a new key even when the selector ignores that entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SelectorCacheKey {
    state: u64,
    args: u64,
}

impl SelectorCacheKey {
    /// Computes the key for a call. O(top-level keys + args size).
    pub fn new(state: &State, args: &[Value]) -> Self {
        Self {
            state: state.fingerprint(),
            args: fingerprint_args(args),
        }
    }

    /// The state half of the key.
    #[inline]
    pub fn state_fingerprint(&self) -> u64 {
        self.state
    }

    /// The argument half of the key.
    #[inline]
    pub fn args_fingerprint(&self) -> u64 {
        self.args
    }
}
