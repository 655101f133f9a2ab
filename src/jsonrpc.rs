//! JSON-RPC 2.0 message types shared by every transport adapter.
//!
//! Adapted from the teacher crate's `transport::jsonrpc` module: a
//! hand-rolled `Deserialize` distinguishes Request/Response/Notification
//! by inspecting which keys are present, since `#[serde(untagged)]`
//! cannot reliably tell a request from a response.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes used by this bridge.
pub mod error_codes {
    /// Used for the two "no usable session" conditions in §4.6/§4.7.
    pub const SERVER_ERROR: i64 = -32000;
    /// Internal server error (stateless POST handler panics/unhandled errors).
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Deserializes a present JSON value (including `null`) as `Some(value)`.
///
/// Standard serde maps JSON `null` to `None` for `Option<T>`, but JSON-RPC
/// needs to distinguish `"result": null` (a valid response) from an
/// absent `result` field (not a response at all).
fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A JSON-RPC 2.0 message: request, response, or notification.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::derive_partial_eq_without_eq)] // serde_json::Value isn't Eq
pub enum JsonRpcMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A response to a previous request.
    Response(JsonRpcResponse),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Returns the message id, if present (requests and responses only).
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => Some(&r.id),
            Self::Notification(_) => None,
        }
    }

    /// Returns the method name, if present (requests and notifications only).
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }

    /// True if this message is an `initialize` request.
    #[must_use]
    pub fn is_initialize_request(&self) -> bool {
        matches!(self, Self::Request(r) if r.method == "initialize")
    }
}

impl Serialize for JsonRpcMessage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Request(r) => r.serialize(serializer),
            Self::Response(r) => r.serialize(serializer),
            Self::Notification(n) => n.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| serde::de::Error::custom("JSON-RPC message must be an object"))?;

        let has_method = obj.contains_key("method");
        let has_id = obj.contains_key("id");
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");

        if has_result || has_error {
            let response: JsonRpcResponse = serde_json::from_value(value)
                .map_err(|e| serde::de::Error::custom(format!("invalid response: {e}")))?;
            Ok(Self::Response(response))
        } else if has_method && has_id {
            let request: JsonRpcRequest = serde_json::from_value(value)
                .map_err(|e| serde::de::Error::custom(format!("invalid request: {e}")))?;
            Ok(Self::Request(request))
        } else if has_method {
            let notification: JsonRpcNotification = serde_json::from_value(value)
                .map_err(|e| serde::de::Error::custom(format!("invalid notification: {e}")))?;
            Ok(Self::Notification(notification))
        } else {
            Err(serde::de::Error::custom(
                "JSON-RPC message must have 'method' (request/notification) or 'result'/'error' (response)",
            ))
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub struct JsonRpcRequest {
    /// Protocol version (must be "2.0").
    pub jsonrpc: String,
    /// Method name to invoke.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request identifier.
    pub id: Value,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub struct JsonRpcResponse {
    /// Protocol version (must be "2.0").
    pub jsonrpc: String,
    /// Result value (present on success).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    pub result: Option<Value>,
    /// Error value (present on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier this response corresponds to.
    pub id: Value,
}

impl JsonRpcResponse {
    /// Builds a successful response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Builds a JSON-RPC error response.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// A JSON-RPC 2.0 notification (a request with no `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub struct JsonRpcNotification {
    /// Protocol version (must be "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Builds a new notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Additional error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Builds the `{code, message, id: null}` envelope used for
    /// transport-level errors that have no associated request id.
    #[must_use]
    pub fn server_error_response(message: impl Into<String>) -> JsonRpcResponse {
        JsonRpcResponse::error(Value::Null, error_codes::SERVER_ERROR, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trip() {
        let request = JsonRpcMessage::Request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: "tools/list".to_string(),
            params: Some(json!({"cursor": null})),
            id: json!(1),
        });
        let serialized = serde_json::to_string(&request).unwrap();
        let deserialized: JsonRpcMessage = serde_json::from_str(&serialized).unwrap();
        assert_eq!(request, deserialized);
    }

    #[test]
    fn response_with_null_result_is_some_null() {
        let raw = r#"{"jsonrpc":"2.0","result":null,"id":1}"#;
        let msg: JsonRpcMessage = serde_json::from_str(raw).unwrap();
        match msg {
            JsonRpcMessage::Response(r) => assert_eq!(r.result, Some(Value::Null)),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn notification_has_no_id() {
        let n = JsonRpcMessage::Notification(JsonRpcNotification::new("notifications/initialized", None));
        assert_eq!(n.id(), None);
        assert_eq!(n.method(), Some("notifications/initialized"));
    }

    #[test]
    fn is_initialize_request_detection() {
        let init = JsonRpcMessage::Request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: "initialize".to_string(),
            params: None,
            id: json!(1),
        });
        assert!(init.is_initialize_request());

        let other = JsonRpcMessage::Request(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: "tools/list".to_string(),
            params: None,
            id: json!(2),
        });
        assert!(!other.is_initialize_request());
    }

    #[test]
    fn message_without_method_or_result_is_rejected() {
        let raw = r#"{"jsonrpc":"2.0","id":1}"#;
        let result: Result<JsonRpcMessage, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn error_response_builder() {
        let resp = JsonRpcResponse::error(json!(null), error_codes::SERVER_ERROR, "bad request");
        assert_eq!(resp.error.as_ref().unwrap().code, error_codes::SERVER_ERROR);
        assert!(resp.result.is_none());
    }
}
