//! Bracketed query-string encoding for GET request data.
//!
//! Nested values flatten the way WordPress expects them:
//! `{"metrics": [{"name": "sessions"}]}` becomes `metrics[0][name]=sessions`.
//! `null` entries are omitted.

use serde_json::Value;

/// Flatten request data into ordered `(key, value)` query pairs.
///
/// Non-object data produces no pairs.
#[must_use]
pub fn encode_query_pairs(data: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Value::Object(map) = data {
        for (key, value) in map {
            flatten(key.clone(), value, &mut pairs);
        }
    }
    pairs
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push((prefix, b.to_string())),
        Value::Number(n) => out.push((prefix, n.to_string())),
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(format!("{prefix}[{i}]"), item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                flatten(format!("{prefix}[{key}]"), item, out);
            }
        }
    }
}
