//! Immutable application state snapshots.
//!
//! A [`State`] is the top-level mapping of the application state tree
//! (`elements`, `document`, `ui`, ...). Every top-level entry carries a
//! fingerprint computed when the entry is stored, and the snapshot carries
//! a combined fingerprint computed once at construction. Selectors key their
//! caches on that fingerprint, so computing a key never walks the tree.
//!
//! Snapshots are persistent: [`State::with`] and [`State::set_path`] return a
//! new snapshot sharing every unchanged entry with the old one.

use crate::error::{Error, Result};
use crate::fingerprint::{fingerprint_value, FnvHasher};
use crate::path::{self, ValuePath};
use crate::value::{Object, Value};
use core::hash::Hasher;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Entry {
    value: Arc<Value>,
    fingerprint: u64,
}

impl Entry {
    fn new(value: Value) -> Self {
        let fingerprint = fingerprint_value(&value);
        Self {
            value: Arc::new(value),
            fingerprint,
        }
    }
}

/// An immutable snapshot of the whole application state.
#[derive(Clone, Debug)]
pub struct State {
    entries: Arc<BTreeMap<String, Entry>>,
    fingerprint: u64,
}

impl State {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::from_entries(BTreeMap::new())
    }

    fn from_entries(entries: BTreeMap<String, Entry>) -> Self {
        let mut hasher = FnvHasher::new();
        hasher.write(b"state");
        for (key, entry) in &entries {
            hasher.write(&(key.len() as u64).to_le_bytes());
            hasher.write(key.as_bytes());
            hasher.write(&entry.fingerprint.to_le_bytes());
        }
        Self {
            entries: Arc::new(entries),
            fingerprint: hasher.finish(),
        }
    }

    /// Builds a state from an object value. Non-object values are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(obj) => Ok(obj.iter().map(|(k, v)| (k, v.clone())).collect()),
            other => Err(Error::type_mismatch("object", other.type_name())),
        }
    }

    /// Parses a JSON document into a state.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// The combined fingerprint of every top-level entry.
    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Fingerprint of one top-level entry.
    pub fn entry_fingerprint(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.fingerprint)
    }

    /// Returns a top-level entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| e.value.as_ref())
    }

    /// Returns a shared handle to a top-level entry.
    pub fn get_shared(&self, key: &str) -> Option<Arc<Value>> {
        self.entries.get(key).map(|e| Arc::clone(&e.value))
    }

    /// Resolves a parsed path. The first segment names a top-level entry.
    pub fn resolve(&self, path: &ValuePath) -> Option<&Value> {
        let root = self.entries.get(&path.root().as_key())?;
        path.resolve_tail(&root.value)
    }

    /// Resolves a dot-separated path; invalid paths resolve to `None`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let path = ValuePath::parse(path).ok()?;
        self.resolve(&path)
    }

    /// Returns a new snapshot with `key` replaced.
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(key.into(), Entry::new(value.into()));
        Self::from_entries(entries)
    }

    /// Returns a new snapshot without `key`.
    pub fn without(&self, key: &str) -> Self {
        let mut entries = (*self.entries).clone();
        entries.remove(key);
        Self::from_entries(entries)
    }

    /// Returns a new snapshot with `new_value` written at `path`, together
    /// with the value previously stored there (Null when absent).
    ///
    /// Only the touched top-level entry is copied and re-fingerprinted.
    pub fn set_path(&self, path: &str, new_value: Value) -> Result<(Self, Value)> {
        let parsed = ValuePath::parse(path)?;
        let root_key = parsed.root().as_key();
        let mut root = self
            .entries
            .get(&root_key)
            .map(|e| (*e.value).clone())
            .unwrap_or(Value::Null);
        let old = path::assign(&mut root, &parsed.segments()[1..], new_value)?;

        let mut entries = (*self.entries).clone();
        entries.insert(root_key, Entry::new(root));
        Ok((Self::from_entries(entries), old))
    }

    /// Number of top-level entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the state has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates top-level keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Converts the snapshot back into a single object value.
    pub fn to_value(&self) -> Value {
        let mut obj = Object::with_capacity(self.entries.len());
        for (key, entry) in self.entries.iter() {
            obj.insert(key.clone(), (*entry.value).clone());
        }
        Value::Object(obj)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.entries, &other.entries) {
            return true;
        }
        self.fingerprint == other.fingerprint
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((k1, e1), (k2, e2))| k1 == k2 && e1.value == e2.value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for State {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), Entry::new(v.into())))
            .collect();
        Self::from_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> State {
        State::from_iter([
            ("document", Value::object([("title", "Q3")])),
            ("ui", Value::object([("zoom", 1)])),
        ])
    }

    #[test]
    fn test_structurally_equal_states_share_fingerprint() {
        let a = sample();
        let b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a, b);
    }

    #[test]
    fn test_top_level_change_changes_fingerprint() {
        let a = sample();
        let b = a.with("ui", Value::object([("zoom", 2)]));
        assert_ne!(a.fingerprint(), b.fingerprint());
        // The untouched entry is shared, not copied.
        assert!(Arc::ptr_eq(
            &a.get_shared("document").unwrap(),
            &b.get_shared("document").unwrap()
        ));
    }

    #[test]
    fn test_set_path_returns_old_value() {
        let a = sample();
        let (b, old) = a.set_path("document.title", Value::from("Q4")).unwrap();
        assert_eq!(old, Value::from("Q3"));
        assert_eq!(b.get_path("document.title"), Some(&Value::from("Q4")));
        assert_eq!(a.get_path("document.title"), Some(&Value::from("Q3")));
        assert_eq!(a.entry_fingerprint("ui"), b.entry_fingerprint("ui"));
    }

    #[test]
    fn test_set_path_creates_missing_root() {
        let (b, old) = State::new().set_path("filters.type", Value::from("text")).unwrap();
        assert!(old.is_null());
        assert_eq!(b.get_path("filters.type"), Some(&Value::from("text")));
    }

    #[test]
    fn test_zero_padded_keys() {
        let state = State::from_json_str(r#"{"codes": {"007": "bond"}, "01": {"x": 1}}"#).unwrap();
        assert_eq!(state.get_path("codes.007"), Some(&Value::from("bond")));
        assert_eq!(state.get_path("01.x"), Some(&Value::from(1)));
        assert_eq!(state.get_path("1.x"), None);

        let (next, old) = state.set_path("codes.007", Value::from("james")).unwrap();
        assert_eq!(old, Value::from("bond"));
        assert_eq!(next.get_path("codes.007"), Some(&Value::from("james")));
        assert_eq!(next.get_path("codes.7"), None);
    }

    #[test]
    fn test_from_value_rejects_scalars() {
        assert!(State::from_value(Value::from(3)).is_err());
        let state = State::from_json_str(r#"{"document": {"title": "x"}}"#).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.to_value().get("document").and_then(|d| d.get("title")), Some(&Value::from("x")));
    }

    #[test]
    fn test_without() {
        let a = sample();
        let b = a.without("ui");
        assert_eq!(b.len(), 1);
        assert!(b.get("ui").is_none());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
