//! JSON-RPC 2.0 envelope types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard JSON-RPC / LSP error codes used by the server.
pub mod error_codes {
    /// Malformed JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Bad params.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal failure.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// The client cancelled the request.
    pub const REQUEST_CANCELLED: i32 = -32800;
}

/// An incoming request or notification (`id == None`).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`.
    #[serde(rename = "jsonrpc", default)]
    pub _jsonrpc: String,
    /// Request id; absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// True for notifications (no reply expected).
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// An outgoing response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Request id this responds to.
    pub id: Option<Value>,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    /// A `null` success response.
    pub fn null(id: Option<Value>) -> Self {
        Self::success(id, Value::Null)
    }

    /// An error response.
    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }
}

/// An outgoing notification.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Parameters.
    pub params: Value,
}

impl JsonRpcNotification {
    /// Build a notification.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), method: method.into(), params }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Build an error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// The standard "request cancelled" error.
    pub fn cancelled() -> Self {
        Self::new(error_codes::REQUEST_CANCELLED, "request cancelled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_testkit::must;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_with_id_is_not_a_notification() {
        let req: JsonRpcRequest = must(serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 3, "method": "textDocument/hover", "params": {}
        })));
        assert!(!req.is_notification());
        assert_eq!(req.method, "textDocument/hover");
    }

    #[test]
    fn response_omits_empty_fields() {
        let resp = JsonRpcResponse::null(Some(json!(1)));
        let text = must(serde_json::to_string(&resp));
        assert!(text.contains("\"result\":null"));
        assert!(!text.contains("error"));
    }

    #[test]
    fn error_response_round_trips() {
        let resp = JsonRpcResponse::error(Some(json!(1)), JsonRpcError::cancelled());
        let value = must(serde_json::to_value(&resp));
        assert_eq!(value["error"]["code"], json!(error_codes::REQUEST_CANCELLED));
    }
}
