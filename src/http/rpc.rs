//! JSON-RPC envelope.
//!
//! # Responsibilities
//! - Parse the `{method, params, clientId}` request body shape
//! - Build `{result}` / `{error}` response objects
//! - Carry the events-pending marker on responses
//!
//! # Design Decisions
//! - The envelope is a thin layer over serde_json values; method handlers
//!   interpret `params` themselves
//! - Requests are routed by URI, so an absent body method falls back to the
//!   final path segment
//! - Events-pending (`ep`) is a string field, `"true"`/`"false"`, matching
//!   what clients parse

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::http::request::SessionRequest;
use crate::http::response::{self, SessionResponse};

/// Field carrying the "more events pending" marker on RPC responses.
pub const EVENTS_PENDING_FIELD: &str = "ep";

/// Error codes clients understand.
pub mod error_code {
    pub const SUCCESS: i32 = 0;
    pub const UNAUTHORIZED: i32 = 3;
    pub const PARSE_ERROR: i32 = 5;
    pub const INVALID_REQUEST: i32 = 6;
    pub const METHOD_NOT_FOUND: i32 = 7;
    pub const EXECUTION_ERROR: i32 = 12;
}

/// Wire-level RPC error object (`{code, message}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_code::METHOD_NOT_FOUND,
            format!("method '{method}' does not exist"),
        )
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(error_code::PARSE_ERROR, format!("invalid rpc request: {detail}"))
    }

    pub fn execution_error(detail: impl std::fmt::Display) -> Self {
        Self::new(error_code::EXECUTION_ERROR, detail.to_string())
    }

    pub fn unauthorized() -> Self {
        Self::new(error_code::UNAUTHORIZED, "unauthorized")
    }
}

/// A parsed RPC request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, rename = "clientId")]
    pub client_id: Option<String>,
}

impl RpcRequest {
    /// Parse a request as an RPC envelope.
    ///
    /// An empty body is a bare method call; either way, a missing `method`
    /// field is filled from the final path segment.
    pub fn parse(request: &SessionRequest) -> Result<Self, RpcError> {
        let mut parsed = if request.body().is_empty() {
            Self {
                method: String::new(),
                params: Value::Null,
                client_id: None,
            }
        } else {
            serde_json::from_slice::<Self>(request.body()).map_err(RpcError::parse_error)?
        };

        if parsed.method.is_empty() {
            parsed.method = final_path_segment(request.path()).to_string();
        }
        if parsed.method.is_empty() {
            return Err(RpcError::new(
                error_code::INVALID_REQUEST,
                "rpc request has no method",
            ));
        }
        Ok(parsed)
    }
}

/// An RPC response envelope under construction.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    fields: Map<String, Value>,
}

impl RpcResponse {
    /// Successful response carrying `result`.
    pub fn result(value: Value) -> Self {
        let mut fields = Map::new();
        fields.insert("result".to_string(), value);
        Self { fields }
    }

    /// Error response carrying `error`.
    pub fn error(error: RpcError) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "error".to_string(),
            json!({ "code": error.code, "message": error.message }),
        );
        Self { fields }
    }

    /// Attach the events-pending marker.
    pub fn with_events_pending(mut self, pending: bool) -> Self {
        let marker = if pending { "true" } else { "false" };
        self.fields.insert(
            EVENTS_PENDING_FIELD.to_string(),
            Value::String(marker.to_string()),
        );
        self
    }

    /// Set an extra top-level field.
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// The envelope as a JSON value.
    pub fn as_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Render as a 200 JSON HTTP response.
    pub fn into_http(self) -> SessionResponse {
        response::ok_json(&Value::Object(self.fields))
    }
}

fn final_path_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}
