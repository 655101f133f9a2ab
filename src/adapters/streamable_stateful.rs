//! Stateful Streamable-HTTP Adapter (spec §4.6).
//!
//! One `Child` per session (not per binding): a session is created by the
//! first `initialize` POST, after which the session-id travels in the
//! `Mcp-Session-Id` header. Session lifetime is governed by the
//! [`SessionAccessCounter`]'s idle timer.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::{json_rpc_error, DecGuard};
use crate::binding::ServerMetadata;
use crate::child::Child;
use crate::jsonrpc::{error_codes, JsonRpcMessage};
use crate::observability::metrics::set_sessions_active;
use crate::session::SessionAccessCounter;

const SESSION_HEADER: &str = "mcp-session-id";

/// Shared state for one binding's stateful Streamable-HTTP endpoint.
pub struct StatefulAdapterState {
    command: String,
    sessions: DashMap<String, Arc<Child>>,
    counter: SessionAccessCounter,
    /// Passive metadata for this binding's Server instance (spec §3).
    #[allow(dead_code)]
    metadata: ServerMetadata,
    /// Label used for the `mcpbridge_sessions_active` gauge.
    binding_label: String,
}

impl StatefulAdapterState {
    /// `session_timeout` of `None` disables idle expiry (spec §4.6: "If
    /// unset, sessions persist until the transport closes, errors, or a
    /// DELETE is processed").
    #[must_use]
    pub fn new(command: String, session_timeout: Option<Duration>, binding_label: String) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
            let weak = weak.clone();
            let counter = SessionAccessCounter::new(session_timeout, move |session_id| {
                if let Some(state) = weak.upgrade() {
                    if let Some((_, child)) = state.sessions.remove(&session_id) {
                        tokio::spawn(async move { child.kill().await });
                    }
                    set_sessions_active(&state.binding_label, state.sessions.len() as f64);
                }
            });
            Self { command, sessions: DashMap::new(), counter, metadata: ServerMetadata::default(), binding_label }
        })
    }

    /// True while every session's child is still running. A binding with
    /// no sessions is vacuously healthy (spec §4.8).
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.sessions.iter().any(|entry| entry.value().has_exited())
    }
}

/// Mounts `POST`/`GET`/`DELETE <streamableHttpPath>`.
#[must_use]
pub fn router(state: Arc<StatefulAdapterState>, path: &str) -> Router {
    Router::new()
        .route(path, post(handle_post).get(handle_get).delete(handle_delete))
        .with_state(state)
}

fn no_valid_session_response() -> Response {
    json_rpc_error(StatusCode::BAD_REQUEST, error_codes::SERVER_ERROR, "Bad Request: No valid session ID provided")
}

fn invalid_session_plaintext() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid or missing session ID").into_response()
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn session_header_value(id: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(SESSION_HEADER),
        HeaderValue::try_from(id).expect("uuid is always a valid header value"),
    )
}

async fn handle_post(State(state): State<Arc<StatefulAdapterState>>, headers: HeaderMap, body: Bytes) -> Response {
    let existing = session_id_from_headers(&headers);

    let message: Result<JsonRpcMessage, _> = serde_json::from_slice(&body);

    let session_id = match existing {
        Some(id) if state.sessions.contains_key(&id) => {
            state.counter.inc(&id, "post_reuse");
            id
        }
        Some(_) => return no_valid_session_response(),
        None => {
            let is_init = matches!(&message, Ok(m) if m.is_initialize_request());
            if !is_init {
                return no_valid_session_response();
            }
            let id = Uuid::new_v4().to_string();
            let child = match Child::spawn(&state.command) {
                Ok(child) => Arc::new(child),
                Err(e) => {
                    warn!(error = %e, "failed to spawn child for new stateful session");
                    return json_rpc_error(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, "Internal server error");
                }
            };
            state.sessions.insert(id.clone(), Arc::clone(&child));
            state.counter.inc(&id, "session_created");
            set_sessions_active(&state.binding_label, state.sessions.len() as f64);
            spawn_exit_watcher(Arc::clone(&state), id.clone(), Arc::clone(&child));
            id
        }
    };

    let _dec_guard = DecGuard::new(state.counter.clone(), session_id.clone(), "post_done");

    let Some(child) = state.sessions.get(&session_id).map(|e| Arc::clone(e.value())) else {
        return no_valid_session_response();
    };

    let message = match message {
        Ok(m) => m,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid JSON-RPC message: {e}")).into_response(),
    };

    let (name, value) = session_header_value(&session_id);

    if let Some(request_id) = message.id().cloned() {
        let mut rx = child.subscribe();
        if let Err(e) = child.send(&message).await {
            return json_rpc_error(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, format!("delivery failed: {e}"));
        }
        match await_matching_response(&mut rx, &request_id, &child).await {
            Some(response) => {
                let mut resp = (StatusCode::OK, axum::Json(response)).into_response();
                resp.headers_mut().insert(name, value);
                resp
            }
            None => json_rpc_error(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, "child exited before responding"),
        }
    } else {
        if let Err(e) = child.send(&message).await {
            return json_rpc_error(StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR, format!("delivery failed: {e}"));
        }
        let mut resp = StatusCode::ACCEPTED.into_response();
        resp.headers_mut().insert(name, value);
        resp
    }
}

/// Races the broadcast receive against the session's child exiting, per
/// spec §7 error taxonomy item 5: a child that dies mid-request must fail
/// the request rather than hang it forever.
async fn await_matching_response(
    rx: &mut broadcast::Receiver<JsonRpcMessage>,
    request_id: &Value,
    child: &Child,
) -> Option<JsonRpcMessage> {
    if child.has_exited() {
        return None;
    }
    let mut exit_rx = child.exit_receiver();
    loop {
        tokio::select! {
            biased;
            _ = exit_rx.changed() => {
                return None;
            }
            r = rx.recv() => match r {
                Ok(message @ JsonRpcMessage::Response(_)) if message.id() == Some(request_id) => {
                    return Some(message);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            },
        }
    }
}

/// Tears down a session once its child exits without an explicit DELETE
/// (spec §4.2/§4.6): routes through the same `on_expire` teardown the idle
/// timer uses, so removal logic isn't duplicated. Idempotent — a no-op if
/// the session was already removed by DELETE or idle-timeout.
fn spawn_exit_watcher(state: Arc<StatefulAdapterState>, session_id: String, child: Arc<Child>) {
    tokio::spawn(async move {
        if child.has_exited() {
            state.counter.clear(&session_id, true, "child_exited");
            return;
        }
        let mut exit_rx = child.exit_receiver();
        if exit_rx.changed().await.is_ok() {
            state.counter.clear(&session_id, true, "child_exited");
        }
    });
}

/// Server→client push channel for unsolicited child-originated messages
/// on this session (spec glossary/§4.6): notifications and progress
/// updates that aren't the response to any in-flight POST.
async fn handle_get(
    State(state): State<Arc<StatefulAdapterState>>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = session_id_from_headers(&headers) else {
        return invalid_session_plaintext();
    };
    let Some(child) = state.sessions.get(&session_id).map(|e| Arc::clone(e.value())) else {
        return invalid_session_plaintext();
    };
    state.counter.inc(&session_id, "get_stream");

    let stream_state = GetStreamState {
        rx: child.subscribe(),
        _guard: DecGuard::new(state.counter.clone(), session_id, "get_done"),
    };

    let stream = futures_util::stream::unfold(stream_state, |mut st| async move {
        loop {
            match st.rx.recv().await {
                Ok(message) => {
                    let data = serde_json::to_string(&message).unwrap_or_default();
                    return Some((Ok(Event::default().data(data)), st));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

struct GetStreamState {
    rx: broadcast::Receiver<JsonRpcMessage>,
    _guard: DecGuard,
}

async fn handle_delete(State(state): State<Arc<StatefulAdapterState>>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_from_headers(&headers) else {
        return invalid_session_plaintext();
    };
    let Some((_, child)) = state.sessions.remove(&session_id) else {
        return invalid_session_plaintext();
    };
    state.counter.clear(&session_id, false, "delete");
    set_sessions_active(&state.binding_label, state.sessions.len() as f64);
    child.kill().await;
    StatusCode::OK.into_response()
}
