//! Dot-separated paths into state trees.
//!
//! A path such as `document.pages.0.title` is parsed once into segments.
//! Canonical decimal segments become [`Segment::Index`], which index arrays
//! and also resolve as keys on objects (`elements.5` works on either shape).
//! Any other spelling, such as `007` or `+1`, stays a plain key.

use crate::error::{Error, Result};
use crate::value::{Object, Value};
use core::fmt;

/// One step of a [`ValuePath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key lookup.
    Key(String),
    /// Array index, or object key with the same decimal text. Only built
    /// from canonical text, so `as_key` round-trips.
    Index(usize),
}

impl Segment {
    fn parse(text: &str) -> Self {
        match text.parse::<usize>() {
            Ok(index) if index.to_string() == text => Segment::Index(index),
            _ => Segment::Key(text.to_string()),
        }
    }

    /// Resolves this segment against a single value.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (Segment::Key(key), Value::Object(obj)) => obj.get(key),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            (Segment::Index(index), Value::Object(obj)) => obj.get(&index.to_string()),
            _ => None,
        }
    }

    /// The textual key used when this segment addresses an object.
    pub fn as_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A parsed dot-separated path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValuePath {
    raw: String,
    segments: Vec<Segment>,
}

impl ValuePath {
    /// Parses a dot-separated path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::invalid_path(path, "path is empty"));
        }
        let mut segments = Vec::new();
        for part in path.split('.') {
            if part.is_empty() {
                return Err(Error::invalid_path(path, "empty segment"));
            }
            segments.push(Segment::parse(part));
        }
        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// Returns the original path text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed segments.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The first segment, naming a top-level state entry.
    pub fn root(&self) -> &Segment {
        &self.segments[0]
    }

    /// Walks the remaining segments (after the first) starting at `value`.
    pub fn resolve_tail<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        resolve_segments(value, &self.segments[1..])
    }

    /// Walks every segment starting at `value`.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        resolve_segments(value, &self.segments)
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Walks `segments` from `value`, stopping at the first missing step or null.
pub fn resolve_segments<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        if current.is_null() {
            return None;
        }
        current = segment.lookup(current)?;
    }
    Some(current)
}

/// Writes `new_value` at `segments` below `target`, creating intermediate
/// objects for missing keys. Returns the previous value (Null if absent).
///
/// Arrays may be indexed in range or appended to at `len`; writing through a
/// scalar is an error.
pub fn assign(target: &mut Value, segments: &[Segment], new_value: Value) -> Result<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(core::mem::replace(target, new_value));
    };

    if target.is_null() {
        *target = Value::Object(Object::new());
    }

    match target {
        Value::Object(obj) => {
            let key = head.as_key();
            if obj.get(&key).is_none() {
                obj.insert(key.clone(), Value::Null);
            }
            let child = obj
                .get_mut(&key)
                .ok_or_else(|| Error::invalid_path(key.clone(), "key vanished during write"))?;
            assign(child, rest, new_value)
        }
        Value::Array(items) => {
            let Segment::Index(index) = head else {
                return Err(Error::invalid_path(head.as_key(), "non-numeric segment on array"));
            };
            if *index == items.len() {
                items.push(Value::Null);
            }
            let len = items.len();
            let child = items.get_mut(*index).ok_or_else(|| {
                Error::invalid_path(index.to_string(), format!("index out of bounds (len {len})"))
            })?;
            assign(child, rest, new_value)
        }
        other => Err(Error::type_mismatch("object or array", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        Value::object([
            (
                "document",
                Value::object([("title", Value::from("Q3")), ("meta", Value::Null)]),
            ),
            (
                "elements",
                Value::array([
                    Value::object([("id", 0), ("status", 1)]),
                    Value::object([("id", 1), ("status", 2)]),
                ]),
            ),
        ])
    }

    #[test]
    fn test_parse_segments() {
        let path = ValuePath::parse("elements.1.status").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("elements".into()),
                Segment::Index(1),
                Segment::Key("status".into())
            ]
        );
        assert_eq!(path.to_string(), "elements.1.status");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(ValuePath::parse("").is_err());
        assert!(ValuePath::parse("a..b").is_err());
        assert!(ValuePath::parse(".a").is_err());
    }

    #[test]
    fn test_resolve() {
        let value = doc();
        let path = ValuePath::parse("elements.1.status").unwrap();
        assert_eq!(path.resolve(&value), Some(&Value::from(2)));

        let path = ValuePath::parse("document.title").unwrap();
        assert_eq!(path.resolve(&value), Some(&Value::from("Q3")));
    }

    #[test]
    fn test_resolve_missing_and_null() {
        let value = doc();
        assert_eq!(ValuePath::parse("document.nope").unwrap().resolve(&value), None);
        assert_eq!(ValuePath::parse("elements.9").unwrap().resolve(&value), None);
        // Walking through null stops.
        assert_eq!(ValuePath::parse("document.meta.x").unwrap().resolve(&value), None);
    }

    #[test]
    fn test_numeric_key_on_object() {
        let value = Value::object([("pages", Value::object([("2", "second")]))]);
        let path = ValuePath::parse("pages.2").unwrap();
        assert_eq!(path.resolve(&value), Some(&Value::from("second")));
    }

    #[test]
    fn test_zero_padded_segments_are_keys() {
        let path = ValuePath::parse("codes.007.01").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("codes".into()),
                Segment::Key("007".into()),
                Segment::Key("01".into())
            ]
        );
        assert_eq!(ValuePath::parse("+1").unwrap().root(), &Segment::Key("+1".into()));
        assert_eq!(ValuePath::parse("0").unwrap().root(), &Segment::Index(0));

        let mut value = Value::object([(
            "codes",
            Value::object([("007", "bond"), ("7", "seven")]),
        )]);
        let padded = ValuePath::parse("codes.007").unwrap();
        assert_eq!(padded.resolve(&value), Some(&Value::from("bond")));

        let old = assign(&mut value, padded.segments(), Value::from("james")).unwrap();
        assert_eq!(old, Value::from("bond"));
        assert_eq!(padded.resolve(&value), Some(&Value::from("james")));
        assert_eq!(
            ValuePath::parse("codes.7").unwrap().resolve(&value),
            Some(&Value::from("seven"))
        );
    }

    #[test]
    fn test_assign_existing_and_new() {
        let mut value = doc();
        let path = ValuePath::parse("document.title").unwrap();
        let old = assign(&mut value, path.segments(), Value::from("Q4")).unwrap();
        assert_eq!(old, Value::from("Q3"));
        assert_eq!(path.resolve(&value), Some(&Value::from("Q4")));

        let path = ValuePath::parse("ui.panel.open").unwrap();
        let old = assign(&mut value, path.segments(), Value::Bool(true)).unwrap();
        assert!(old.is_null());
        assert_eq!(path.resolve(&value), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_assign_array() {
        let mut value = doc();
        let path = ValuePath::parse("elements.0.status").unwrap();
        assign(&mut value, path.segments(), Value::from(9)).unwrap();
        assert_eq!(path.resolve(&value), Some(&Value::from(9)));

        // Append at len.
        let path = ValuePath::parse("elements.2").unwrap();
        assign(&mut value, path.segments(), Value::from("new")).unwrap();
        assert_eq!(value.get("elements").and_then(|e| e.as_array()).map(Vec::len), Some(3));

        let path = ValuePath::parse("elements.7").unwrap();
        assert!(assign(&mut value, path.segments(), Value::Null).is_err());
    }

    #[test]
    fn test_assign_through_scalar_fails() {
        let mut value = doc();
        let path = ValuePath::parse("document.title.x").unwrap();
        assert!(matches!(
            assign(&mut value, path.segments(), Value::Null),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
