//! Change events delivered to subscriptions.
//!
//! A `StateChange` describes one write to the state tree. A `SelectorChange`
//! describes a selector whose memoized output moved from one value to
//! another.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tessera_core::Value;

/// Kind of write that produced a [`StateChange`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A value was written at an existing or new path.
    #[default]
    Set,
    /// A value appeared where there was none.
    Insert,
    /// A value was removed.
    Delete,
    /// A value was modified in place.
    Update,
}

/// One change to the state tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Dot-separated path of the written value.
    pub path: String,
    /// Value before the change (Null when absent).
    pub old_value: Value,
    /// Value after the change (Null when removed).
    pub new_value: Value,
    pub timestamp: SystemTime,
    pub change_type: ChangeType,
}

impl StateChange {
    /// Creates a `Set` change stamped with the current time.
    pub fn new(path: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            path: path.into(),
            old_value,
            new_value,
            timestamp: SystemTime::now(),
            change_type: ChangeType::Set,
        }
    }

    /// Creates a change whose type is derived from which side is Null.
    pub fn inferred(path: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        let change_type = match (old_value.is_null(), new_value.is_null()) {
            (true, false) => ChangeType::Insert,
            (false, true) => ChangeType::Delete,
            (false, false) => ChangeType::Update,
            (true, true) => ChangeType::Set,
        };
        Self::new(path, old_value, new_value).with_change_type(change_type)
    }

    /// Returns the change with a different type.
    #[inline]
    pub fn with_change_type(mut self, change_type: ChangeType) -> Self {
        self.change_type = change_type;
        self
    }

    /// Returns false for no-op writes, which are never delivered.
    #[inline]
    pub fn has_actual_change(&self) -> bool {
        self.old_value != self.new_value
    }
}

/// A selector output transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectorChange {
    /// Name the selector is registered under.
    pub selector: String,
    pub old_value: Value,
    pub new_value: Value,
}

impl SelectorChange {
    pub fn new(selector: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            selector: selector.into(),
            old_value,
            new_value,
        }
    }
}

/// Event types a subscription can receive.
pub trait ChangeEvent {
    /// Value after the change; subscription filters test this.
    fn new_value(&self) -> &Value;
}

impl ChangeEvent for StateChange {
    fn new_value(&self) -> &Value {
        &self.new_value
    }
}

impl ChangeEvent for SelectorChange {
    fn new_value(&self) -> &Value {
        &self.new_value
    }
}
