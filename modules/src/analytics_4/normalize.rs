//! Report option normalization.
//!
//! `metrics` and `dimensions` accept a name, an object or a mixed list of
//! both. Normalized options always carry both keys as lists of objects, so
//! two spellings of the same request share one cache entry.

use serde_json::{Map, Value};

#[must_use]
pub fn normalize_report_options(options: &Value) -> Value {
    let mut normalized = Map::new();
    let empty = Map::new();
    let options = options.as_object().unwrap_or(&empty);

    normalized.insert(
        "metrics".to_string(),
        normalize_entries(options.get("metrics")),
    );
    normalized.insert(
        "dimensions".to_string(),
        normalize_entries(options.get("dimensions")),
    );
    for (key, value) in options {
        if key != "metrics" && key != "dimensions" {
            normalized.insert(key.clone(), value.clone());
        }
    }
    Value::Object(normalized)
}

/// Names become `{ "name": ... }`; anything that is not then an object is
/// dropped.
fn normalize_entries(entries: Option<&Value>) -> Value {
    let items: Vec<&Value> = match entries {
        None => Vec::new(),
        Some(Value::Array(list)) => list.iter().collect(),
        Some(single) => vec![single],
    };
    let normalized = items
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(name) => {
                let mut object = Map::new();
                object.insert("name".to_string(), Value::String(name.clone()));
                Some(Value::Object(object))
            }
            Value::Object(_) => Some(entry.clone()),
            _ => None,
        })
        .collect();
    Value::Array(normalized)
}
