//! Structured errors returned by the REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error payload in the shape the REST API returns it:
/// `{ "code": "...", "message": "...", "data": { "status": 500 } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} ({code})")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub data: ApiErrorData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: ApiErrorData::default(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.data.status = Some(status);
        self
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.data.status
    }

    /// Parse an error body. Returns `None` unless the body carries at least a
    /// string `code` and `message`.
    #[must_use]
    pub fn from_body(body: &Value) -> Option<Self> {
        let code = body.get("code")?.as_str()?;
        let message = body.get("message")?.as_str()?;
        let data = body
            .get("data")
            .and_then(|d| serde_json::from_value(d.clone()).ok())
            .unwrap_or_default();
        Some(Self {
            code: code.to_string(),
            message: message.to_string(),
            data,
        })
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
