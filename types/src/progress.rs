//! `$/` notifications: request cancellation and progress reporting.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Method name of progress notifications.
pub const PROGRESS_METHOD: &str = "$/progress";

/// Errors raised when an inbound value does not have the expected protocol shape.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid progress parameters: {0}")]
    InvalidProgressParams(#[source] serde_json::Error),
    #[error("invalid progress notification: {0}")]
    InvalidProgressNotification(String),
}

/// Integer or string identifier (progress tokens, request ids in `$/cancelRequest`).
///
/// Numbers keep their JSON representation, so the full `u64` id range survives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(Number),
    String(String),
}

impl From<i64> for NumberOrString {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for NumberOrString {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for NumberOrString {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for NumberOrString {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelParams {
    pub id: NumberOrString,
}

/// Payload of a `$/progress` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressParams {
    pub token: NumberOrString,
    pub value: Value,
}

impl ProgressParams {
    pub fn new(token: impl Into<NumberOrString>, value: Value) -> Self {
        Self {
            token: token.into(),
            value,
        }
    }

    /// Parse the `params` object of a progress notification.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(value).map_err(ProtocolError::InvalidProgressParams)
    }

    /// Extract progress parameters from a whole decoded notification.
    pub fn from_notification(message: &Value) -> Result<Self, ProtocolError> {
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidProgressNotification("missing method".into()))?;
        if method != PROGRESS_METHOD {
            return Err(ProtocolError::InvalidProgressNotification(format!(
                "unexpected method {method}"
            )));
        }
        let params = message
            .get("params")
            .cloned()
            .ok_or_else(|| ProtocolError::InvalidProgressNotification("missing params".into()))?;
        Self::from_value(params)
    }
}
