//! End-to-end scenario 6 (spec §8): the stateless Streamable-HTTP
//! adapter answers `GET`/`DELETE` with 405 and the standard JSON-RPC
//! "Method not allowed." envelope.

use mcpbridge::adapters::streamable_stateless::{router, StatelessAdapterState};
use mcpbridge::jsonrpc::JsonRpcMessage;
use tower::ServiceExt;

async fn assert_method_not_allowed(method: &str) {
    let state = StatelessAdapterState::new("cat".to_string(), "2024-11-05".to_string());
    let app = router(state, "/mcp");
    let request = axum::http::Request::builder().method(method).uri("/mcp").body(axum::body::Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::METHOD_NOT_ALLOWED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let message: JsonRpcMessage = serde_json::from_slice(&body).unwrap();
    match message {
        JsonRpcMessage::Response(r) => {
            let error = r.error.expect("expected a JSON-RPC error envelope");
            assert_eq!(error.code, -32000);
            assert_eq!(error.message, "Method not allowed.");
            assert_eq!(r.id, serde_json::Value::Null);
        }
        other => panic!("expected a response message, got {other:?}"),
    }
}

#[tokio::test]
async fn get_is_rejected() {
    assert_method_not_allowed("GET").await;
}

#[tokio::test]
async fn delete_is_rejected() {
    assert_method_not_allowed("DELETE").await;
}
