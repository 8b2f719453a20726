//! JSON-RPC envelopes and typed LSP message builders.

use lspc_types::{
    CancelParams, DidChangeTextDocumentParams, DidOpenTextDocumentParams, InitializeParams,
    NumberOrString, ProgressParams,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use lspc_types::PROGRESS_METHOD;

pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED: &str = "initialized";
pub const SHUTDOWN: &str = "shutdown";
pub const EXIT: &str = "exit";
pub const DID_OPEN: &str = "textDocument/didOpen";
pub const DID_CHANGE: &str = "textDocument/didChange";
pub const CANCEL_REQUEST: &str = "$/cancelRequest";

const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// A request: carries an id and expects a response with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Build a request with a caller-chosen id.
    ///
    /// Prefer [`RequestRegistry::request`](crate::RequestRegistry::request),
    /// which guarantees the id is unique.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            method: method.into(),
            params,
        }
    }

    pub fn initialize(id: u64, params: &InitializeParams) -> Result<Self, serde_json::Error> {
        Ok(Self::new(id, INITIALIZE, Some(serde_json::to_value(params)?)))
    }

    pub fn shutdown(id: u64) -> Self {
        Self::new(id, SHUTDOWN, None)
    }
}

/// A one-way message: no id, no response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            method: method.into(),
            params,
        }
    }

    pub fn initialized() -> Self {
        Self::new(INITIALIZED, Some(serde_json::json!({})))
    }

    pub fn exit() -> Self {
        Self::new(EXIT, None)
    }

    pub fn did_open(params: &DidOpenTextDocumentParams) -> Result<Self, serde_json::Error> {
        Ok(Self::new(DID_OPEN, Some(serde_json::to_value(params)?)))
    }

    pub fn did_change(params: &DidChangeTextDocumentParams) -> Result<Self, serde_json::Error> {
        Ok(Self::new(DID_CHANGE, Some(serde_json::to_value(params)?)))
    }

    /// Ask the server to cancel request `id`.
    ///
    /// This is an ordinary outgoing message; nothing local is cancelled.
    pub fn cancel_request(id: impl Into<NumberOrString>) -> Result<Self, serde_json::Error> {
        let params = CancelParams { id: id.into() };
        Ok(Self::new(CANCEL_REQUEST, Some(serde_json::to_value(params)?)))
    }

    pub fn progress(params: &ProgressParams) -> Result<Self, serde_json::Error> {
        Ok(Self::new(PROGRESS_METHOD, Some(serde_json::to_value(params)?)))
    }
}

/// Classification of a decoded inbound value.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Reply to one of our requests.
    Response {
        id: Value,
        result: Option<Value>,
        error: Option<Value>,
    },
    /// Server-initiated notification.
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Server-initiated request. Not expected from this client's peers, but tolerated.
    ServerRequest {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    /// Anything else (not an object, or neither id nor method).
    Unknown,
}

impl Incoming {
    #[must_use]
    pub fn classify(message: &Value) -> Self {
        let id = message.get("id").filter(|id| !id.is_null()).cloned();
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .map(String::from);
        let params = message.get("params").cloned();

        match (id, method) {
            (Some(id), Some(method)) => Self::ServerRequest { id, method, params },
            (None, Some(method)) => Self::Notification { method, params },
            (Some(id), None) => Self::Response {
                id,
                result: message.get("result").cloned(),
                error: message.get("error").cloned(),
            },
            (None, None) => Self::Unknown,
        }
    }

    /// Id of a response, if this is one.
    ///
    /// Some servers echo numeric ids back as strings (`"1"`); those are
    /// accepted when the string is a plain integer.
    #[must_use]
    pub fn response_id(&self) -> Option<u64> {
        match self {
            Self::Response { id, .. } => id
                .as_u64()
                .or_else(|| id.as_str().and_then(|s| s.parse().ok())),
            _ => None,
        }
    }
}
