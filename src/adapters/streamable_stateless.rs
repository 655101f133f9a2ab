//! Stateless Streamable-HTTP Adapter (spec §4.7).
//!
//! A fresh `Child` and a fresh auto-initialize handshake per POST — there
//! is no session table. Required because request ids would otherwise
//! collide across concurrent clients sharing one child.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use super::interposer::{build_initialize_request, generate_tracked_init_id, initialized_notification};
use super::json_rpc_error;
use crate::binding::ServerMetadata;
use crate::child::Child;
use crate::jsonrpc::{error_codes, JsonRpcMessage};

/// Shared, read-only configuration for one binding's stateless endpoint.
pub struct StatelessAdapterState {
    command: String,
    protocol_version: String,
}

impl StatelessAdapterState {
    #[must_use]
    pub fn new(command: String, protocol_version: String) -> Arc<Self> {
        Arc::new(Self { command, protocol_version })
    }
}

/// Mounts `POST <streamableHttpPath>`; `GET`/`DELETE` answer `405`.
#[must_use]
pub fn router(state: Arc<StatelessAdapterState>, path: &str) -> Router {
    Router::new().route(path, post(handle_post).fallback(method_not_allowed)).with_state(state)
}

async fn method_not_allowed() -> Response {
    json_rpc_error(StatusCode::METHOD_NOT_ALLOWED, error_codes::SERVER_ERROR, "Method not allowed.")
}

async fn handle_post(State(state): State<Arc<StatelessAdapterState>>, body: Bytes) -> Response {
    let message: JsonRpcMessage = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid JSON-RPC message: {e}")).into_response(),
    };

    let child = match Child::spawn(&state.command) {
        Ok(child) => Arc::new(child),
        Err(e) => {
            warn!(error = %e, "failed to spawn child for stateless POST");
            return json_rpc_error(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, "Internal server error");
        }
    };

    // One passive Server instance per POST (spec §4.7): holds no behavior,
    // only backs the auto-initialize handshake's advertised capabilities.
    let metadata = ServerMetadata::default();
    let response = drive_single_request(&state, &child, &metadata, message).await;
    child.kill().await;

    match response {
        Ok(r) => (StatusCode::OK, Json(r)).into_response(),
        Err(e) => json_rpc_error(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, e),
    }
}

/// Runs one client message through the auto-initialize interposer and
/// returns the single `JsonRpcMessage` to reply with.
async fn drive_single_request(
    state: &StatelessAdapterState,
    child: &Child,
    metadata: &ServerMetadata,
    message: JsonRpcMessage,
) -> Result<JsonRpcMessage, String> {
    if child.has_exited() {
        return Err("child exited before responding".to_string());
    }
    let mut rx = child.subscribe();
    let mut exit_rx = child.exit_receiver();

    let mut tracked_init_id: Option<Value> = None;
    let mut is_auto_initializing = false;
    let mut pending_original: Option<JsonRpcMessage> = None;

    if message.is_initialize_request() {
        tracked_init_id = message.id().cloned();
        child.send(&message).await.map_err(|e| e.to_string())?;
    } else {
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        let init_id = generate_tracked_init_id(millis);
        let init_request = build_initialize_request(&init_id, &state.protocol_version, metadata);
        tracked_init_id = Some(Value::String(init_id));
        is_auto_initializing = true;
        pending_original = Some(message);
        child.send(&init_request).await.map_err(|e| e.to_string())?;
    }

    loop {
        let r = tokio::select! {
            biased;
            changed = exit_rx.changed() => {
                if changed.is_ok() {
                    return Err("child exited before responding".to_string());
                }
                return Err("child closed before responding".to_string());
            }
            r = rx.recv() => match r {
                Ok(r) => r,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err("child closed before responding".to_string()),
            },
        };

        if tracked_init_id.as_ref().is_some_and(|id| r.id() == Some(id)) {
            if is_auto_initializing {
                child.send(&initialized_notification()).await.map_err(|e| e.to_string())?;
                let original = pending_original.take().expect("set when auto-initializing");
                child.send(&original).await.map_err(|e| e.to_string())?;
                is_auto_initializing = false;
                tracked_init_id = None;
                continue;
            }
            return Ok(r);
        }
        return Ok(r);
    }
}
