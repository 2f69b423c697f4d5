//! The action envelope.
//!
//! Every dispatch carries an [`Action`]: a `type` string plus a JSON payload.
//! Slices describe their own actions as a tagged enum
//! (`#[serde(tag = "type", content = "payload")]`) and convert with
//! [`Action::encode`] / [`Action::decode`], so a reducer matches exhaustively
//! over its own variants and ignores envelopes it does not own.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Action {
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// An action with no payload.
    #[must_use]
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Convert a slice's typed action into the generic envelope.
    pub fn encode<T: Serialize>(typed: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(typed).and_then(serde_json::from_value)
    }

    /// Decode the envelope into a slice's typed action.
    ///
    /// Returns `None` when the type is not one of `T`'s variants or the payload
    /// does not match the variant's shape.
    #[must_use]
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        let mut envelope = Map::new();
        envelope.insert("type".to_string(), Value::String(self.kind.clone()));
        if !self.payload.is_null() {
            envelope.insert("payload".to_string(), self.payload.clone());
        }
        serde_json::from_value(Value::Object(envelope)).ok()
    }
}
