//! SSE Adapter (spec §4.5): `stdio ⇄ SSE`.
//!
//! One persistent `Child` per binding. Each SSE subscriber is a
//! broadcast-receiver task over the child's stdout; POSTs are looked up
//! by `sessionId` and written straight to the child's stdin.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Bytes, Router};
use dashmap::DashSet;
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::binding::ServerMetadata;
use crate::child::Child;
use crate::jsonrpc::JsonRpcMessage;
use crate::observability::metrics::set_sessions_active;

/// Shared state for one binding's SSE endpoints.
pub struct SseAdapterState {
    child: Arc<Child>,
    sessions: Arc<DashSet<String>>,
    /// Full URL (or path, if no `--baseUrl`) advertised as the `endpoint`
    /// SSE event's target for this binding's message endpoint.
    message_url_prefix: String,
    /// Passive metadata for this binding's Server instance (spec §3).
    #[allow(dead_code)]
    metadata: ServerMetadata,
    /// Label used for the `mcpbridge_sessions_active` gauge.
    binding_label: String,
}

impl SseAdapterState {
    #[must_use]
    pub fn new(child: Arc<Child>, message_url_prefix: String, binding_label: String) -> Arc<Self> {
        Arc::new(Self {
            child,
            sessions: Arc::new(DashSet::new()),
            message_url_prefix,
            metadata: ServerMetadata::default(),
            binding_label,
        })
    }
}

/// Mounts the `GET <ssePath>` and `POST <messagePath>` routes.
#[must_use]
pub fn router(state: Arc<SseAdapterState>, sse_path: &str, message_path: &str) -> Router {
    Router::new()
        .route(sse_path, get(handle_sse))
        .route(message_path, post(handle_message))
        .with_state(state)
}

#[derive(Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Removes a session-id from the adapter's presence set when the SSE
/// stream it backs is dropped (client disconnect, child exit, or lag).
struct SessionGuard {
    sessions: Arc<DashSet<String>>,
    id: String,
    binding_label: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
        set_sessions_active(&self.binding_label, self.sessions.len() as f64);
    }
}

struct StreamState {
    rx: broadcast::Receiver<JsonRpcMessage>,
    sent_endpoint: bool,
    message_url: String,
    _guard: SessionGuard,
}

async fn handle_sse(
    State(state): State<Arc<SseAdapterState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().to_string();
    state.sessions.insert(session_id.clone());
    set_sessions_active(&state.binding_label, state.sessions.len() as f64);

    let stream_state = StreamState {
        rx: state.child.subscribe(),
        sent_endpoint: false,
        message_url: format!("{}?sessionId={session_id}", state.message_url_prefix),
        _guard: SessionGuard {
            sessions: Arc::clone(&state.sessions),
            id: session_id,
            binding_label: state.binding_label.clone(),
        },
    };

    let stream = futures_util::stream::unfold(stream_state, |mut st| async move {
        if !st.sent_endpoint {
            st.sent_endpoint = true;
            let event = Event::default().event("endpoint").data(st.message_url.clone());
            return Some((Ok(event), st));
        }
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

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn handle_message(
    State(state): State<Arc<SseAdapterState>>,
    Query(params): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = params.session_id else {
        return (StatusCode::SERVICE_UNAVAILABLE, "No sessionId provided").into_response();
    };
    if !state.sessions.contains(&session_id) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("No session found for sessionId: {session_id}"),
        )
            .into_response();
    }

    let message: JsonRpcMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid JSON-RPC message: {e}")).into_response(),
    };

    if let Err(e) = state.child.send(&message).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to deliver message: {e}")).into_response();
    }

    StatusCode::ACCEPTED.into_response()
}
