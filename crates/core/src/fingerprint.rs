//! Structural fingerprints for values, states and argument lists.
//!
//! Fingerprints are used as cache keys by selectors. Two structurally equal
//! values always share a fingerprint; values that differ anywhere produce
//! different fingerprints with high probability.

use crate::value::Value;
use core::hash::Hasher;

/// A simple hasher for computing fingerprints.
/// Uses FNV-1a algorithm which is fast and has good distribution.
#[derive(Clone, Copy, Debug)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::FNV_OFFSET,
        }
    }
}

impl Default for FnvHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= *byte as u64;
            self.state = self.state.wrapping_mul(Self::FNV_PRIME);
        }
    }
}

/// Computes the fingerprint of a single value.
pub fn fingerprint_value(value: &Value) -> u64 {
    let mut hasher = FnvHasher::new();
    hash_value(value, &mut hasher);
    hasher.finish()
}

/// Computes the fingerprint of a positional argument list.
///
/// The empty list has a fixed fingerprint distinct from any non-empty list.
pub fn fingerprint_args(args: &[Value]) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write(b"args");
    hasher.write(&(args.len() as u64).to_le_bytes());
    for arg in args {
        hash_value(arg, &mut hasher);
    }
    hasher.finish()
}

/// Feeds a value into a hasher with type tags so that e.g. `"1"` and `1`
/// never collide structurally.
pub fn hash_value<H: Hasher>(value: &Value, hasher: &mut H) {
    match value {
        Value::Null => hasher.write(b"null"),
        Value::Bool(b) => {
            hasher.write(b"bool");
            hasher.write(&[*b as u8]);
        }
        Value::Number(n) => {
            hasher.write(b"num");
            // Normalize so that equal values hash equally.
            let n = if *n == 0.0 {
                0.0
            } else if n.is_nan() {
                f64::NAN
            } else {
                *n
            };
            hasher.write(&n.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            hasher.write(b"str");
            hasher.write(&(s.len() as u64).to_le_bytes());
            hasher.write(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.write(b"arr");
            hasher.write(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(obj) => {
            hasher.write(b"obj");
            hasher.write(&(obj.len() as u64).to_le_bytes());
            for (key, val) in obj.iter() {
                hasher.write(&(key.len() as u64).to_le_bytes());
                hasher.write(key.as_bytes());
                hash_value(val, hasher);
            }
        }
    }
}
