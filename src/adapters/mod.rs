//! Network transport adapters (spec §4.5–§4.9): one state machine per
//! supported mode translating between framed JSON-RPC and an on-wire
//! transport.

mod interposer;
pub mod reverse;
pub mod sse;
pub mod streamable_stateful;
pub mod streamable_stateless;
pub mod websocket;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::jsonrpc::JsonRpcResponse;
use crate::session::SessionAccessCounter;

/// Builds the `{code, message, id: null}` JSON-RPC error envelope at a
/// given HTTP status, per spec §7's error taxonomy.
pub fn json_rpc_error(status: StatusCode, code: i64, message: impl Into<String>) -> Response {
    (status, Json(JsonRpcResponse::error(Value::Null, code, message))).into_response()
}

/// RAII guard that decrements a [`SessionAccessCounter`] entry exactly
/// once when dropped — covers both normal handler completion and
/// cancellation on client disconnect, matching the teacher's
/// `ConnectionGuard` pattern in `transport::http`.
pub struct DecGuard {
    counter: SessionAccessCounter,
    key: String,
    reason: &'static str,
}

impl DecGuard {
    #[must_use]
    pub fn new(counter: SessionAccessCounter, key: String, reason: &'static str) -> Self {
        Self { counter, key, reason }
    }
}

impl Drop for DecGuard {
    fn drop(&mut self) {
        self.counter.dec(&self.key, self.reason);
    }
}
