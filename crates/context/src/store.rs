//! The current state snapshot.

use parking_lot::RwLock;
use tessera_core::{Result, State, Value};
use tessera_reactive::StateChange;

/// Holds the current [`State`].
///
/// Readers get cheap snapshot clones; writers swap in a new snapshot, so a
/// snapshot taken before a write is never affected by it.
#[derive(Debug, Default)]
pub struct StateStore {
    state: RwLock<State>,
}

impl StateStore {
    pub fn new(state: State) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn snapshot(&self) -> State {
        self.state.read().clone()
    }

    /// Writes `value` at `path` and returns the resulting change. The change
    /// type is inferred from whether the old or new value is null.
    pub fn set(&self, path: &str, value: Value) -> Result<StateChange> {
        let mut state = self.state.write();
        let (next, old) = state.set_path(path, value.clone())?;
        *state = next;
        Ok(StateChange::inferred(path, old, value))
    }

    /// Replaces the whole snapshot and returns one change per top-level key
    /// whose value differs.
    pub fn replace(&self, next: State) -> Vec<StateChange> {
        let previous = core::mem::replace(&mut *self.state.write(), next.clone());
        diff_top_level(&previous, &next)
    }
}

fn diff_top_level(previous: &State, next: &State) -> Vec<StateChange> {
    let mut keys: Vec<&str> = previous.keys().chain(next.keys()).collect();
    keys.sort_unstable();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let old = previous.get(key).cloned().unwrap_or(Value::Null);
            let new = next.get(key).cloned().unwrap_or(Value::Null);
            (old != new).then(|| StateChange::inferred(key, old, new))
        })
        .collect()
}
