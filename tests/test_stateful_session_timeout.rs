//! End-to-end scenario 2 (spec §8): an idle stateful session expires
//! after `--sessionTimeout` and a subsequent POST referencing it is
//! rejected with the standard "no valid session" error envelope.

use mcpbridge::adapters::streamable_stateful::{router, StatefulAdapterState};
use mcpbridge::jsonrpc::JsonRpcMessage;
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;

#[tokio::test(start_paused = true)]
async fn session_expires_and_subsequent_post_is_rejected() {
    let state = StatefulAdapterState::new("cat".to_string(), Some(Duration::from_millis(250)));
    let app = router(std::sync::Arc::clone(&state), "/mcp");

    let init_body =
        serde_json::to_vec(&json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}})).unwrap();
    let init_request = axum::http::Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(init_body))
        .unwrap();
    let init_response = app.clone().oneshot(init_request).await.unwrap();
    let session_id =
        init_response.headers().get("mcp-session-id").unwrap().to_str().unwrap().to_string();

    tokio::time::advance(Duration::from_millis(300)).await;
    tokio::task::yield_now().await;

    let follow_up_body =
        serde_json::to_vec(&json!({"jsonrpc":"2.0","id":2,"method":"tools/list"})).unwrap();
    let follow_up = axum::http::Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("mcp-session-id", session_id)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(follow_up_body))
        .unwrap();
    let response = app.oneshot(follow_up).await.unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let message: JsonRpcMessage = serde_json::from_slice(&body).unwrap();
    match message {
        JsonRpcMessage::Response(r) => {
            let error = r.error.expect("expected a JSON-RPC error envelope");
            assert_eq!(error.code, -32000);
            assert_eq!(error.message, "Bad Request: No valid session ID provided");
        }
        other => panic!("expected a response message, got {other:?}"),
    }
}
