//! Auto-initialize interposer (spec §4.7).
//!
//! Pure helpers for the stateless adapter's handshake-on-behalf-of-client
//! logic: building the synthetic `initialize` request and its tracked id,
//! kept separate from the axum wiring in [`super::streamable_stateless`]
//! so the id format and request shape can be unit tested without a child
//! process.

use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};

use crate::binding::ServerMetadata;
use crate::jsonrpc::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JSONRPC_VERSION};

/// Generates a tracked-init-id of the form `"init_" + millis + "_" + 9
/// base-36 characters`, per spec §4.7.
#[must_use]
pub fn generate_tracked_init_id(millis_since_epoch: u128) -> String {
    let suffix: String =
        rand::rng().sample_iter(&Alphanumeric).map(char::from).take(9).collect::<String>().to_lowercase();
    format!("init_{millis_since_epoch}_{suffix}")
}

/// Builds the synthetic `initialize` request the interposer sends to the
/// child on behalf of the client, advertising `metadata`'s capabilities
/// and identity as the `clientInfo` (the interposer is itself standing
/// in for the client during this handshake).
#[must_use]
pub fn build_initialize_request(id: &str, protocol_version: &str, metadata: &ServerMetadata) -> JsonRpcMessage {
    JsonRpcMessage::Request(JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        method: "initialize".to_string(),
        params: Some(json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "roots": {"listChanged": metadata.capabilities.roots.list_changed},
                "sampling": metadata.capabilities.sampling,
            },
            "clientInfo": {
                "name": metadata.name,
                "version": metadata.version,
            },
        })),
        id: Value::String(id.to_string()),
    })
}

/// Builds the `notifications/initialized` notification sent after the
/// synthetic handshake completes.
#[must_use]
pub fn initialized_notification() -> JsonRpcMessage {
    JsonRpcMessage::Notification(JsonRpcNotification::new("notifications/initialized", None))
}
