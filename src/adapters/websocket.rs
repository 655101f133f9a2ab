//! WebSocket Adapter (spec §4.8).
//!
//! One persistent `Child` per binding, shared by every WebSocket peer
//! connected to that binding's path: inbound frames are written to the
//! child's stdin, and every line the child writes to stdout is broadcast
//! to all connected peers.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::binding::ServerMetadata;
use crate::child::Child;
use crate::jsonrpc::JsonRpcMessage;

/// Shared state for one binding's WebSocket endpoint.
pub struct WebSocketAdapterState {
    child: Arc<Child>,
    /// Passive metadata for this binding's Server instance (spec §3);
    /// held but not yet consulted by the upgrade handshake itself.
    #[allow(dead_code)]
    metadata: ServerMetadata,
}

impl WebSocketAdapterState {
    #[must_use]
    pub fn new(child: Arc<Child>) -> Arc<Self> {
        Arc::new(Self { child, metadata: ServerMetadata::default() })
    }

    /// True if the supervised child is still running (spec §4.8's health
    /// endpoint consults this).
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        !self.child.has_exited()
    }
}

/// Mounts `GET <messagePath>` as a WebSocket upgrade endpoint.
#[must_use]
pub fn router(state: Arc<WebSocketAdapterState>, message_path: &str) -> Router {
    Router::new().route(message_path, get(handle_upgrade)).with_state(state)
}

async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<WebSocketAdapterState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<WebSocketAdapterState>) {
    let mut from_child = state.child.subscribe();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<JsonRpcMessage>(&text) {
                            Ok(message) => {
                                if let Err(e) = state.child.send(&message).await {
                                    warn!(error = %e, "failed to write WebSocket message to child stdin");
                                    break;
                                }
                            }
                            Err(e) => debug!(error = %e, "dropping non-JSON-RPC WebSocket frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
            from_child = from_child.recv() => {
                match from_child {
                    Ok(message) => {
                        let text = serde_json::to_string(&message).unwrap_or_default();
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthy_while_child_runs() {
        let child = Arc::new(Child::spawn("cat").expect("spawn cat"));
        let state = WebSocketAdapterState::new(child);
        assert!(state.is_healthy());
    }

    #[tokio::test]
    async fn unhealthy_once_child_exits() {
        let child = Arc::new(Child::spawn("exit 0").expect("spawn exit 0"));
        let state = WebSocketAdapterState::new(child);
        let mut exit_rx = state.child.exit_receiver();
        tokio::time::timeout(std::time::Duration::from_secs(5), exit_rx.changed()).await.unwrap().unwrap();
        assert!(!state.is_healthy());
    }
}
