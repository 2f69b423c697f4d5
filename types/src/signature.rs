//! Argument signatures.
//!
//! A signature is the canonical serialization of a selector, resolver or action
//! call's argument list. Object keys are sorted recursively, so two argument
//! lists that are deep-equal produce the same signature no matter how their
//! objects were built. Array order is significant.

use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Canonical, order-independent key for a call's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgSignature(String);

impl ArgSignature {
    /// Signature of an argument list.
    #[must_use]
    pub fn of(args: &[Value]) -> Self {
        let mut out = String::with_capacity(32);
        out.push('[');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_canonical(arg, &mut out);
        }
        out.push(']');
        Self(out)
    }

    /// Signature of a single value, used when state is addressed by one
    /// options object rather than an argument list.
    #[must_use]
    pub fn of_value(value: &Value) -> Self {
        let mut out = String::new();
        write_canonical(value, &mut out);
        Self(out)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 of the canonical form as lowercase hex.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex_encode(&hasher.finalize())
    }
}

impl fmt::Display for ArgSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArgSignature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rebuild a value with every object's keys in sorted order.
///
/// Idempotent: `canonicalize(&canonicalize(v)) == canonicalize(v)`.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// Writes sorted keys explicitly instead of relying on the map's iteration
// order, which depends on serde_json's `preserve_order` feature.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
