//! End-to-end scenario 1 (spec §8): a non-`initialize` POST to the
//! stateless Streamable-HTTP adapter causes the bridge to run the
//! handshake on the child's stdin transparently before forwarding the
//! client's own message, and only the client's message's reply reaches
//! the client.

use mcpbridge::adapters::streamable_stateless::{router, StatelessAdapterState};
use mcpbridge::jsonrpc::JsonRpcMessage;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn non_initialize_post_runs_handshake_before_forwarding() {
    let log_file = tempfile::NamedTempFile::new().unwrap();
    let log_path = log_file.path().to_string_lossy().to_string();

    // Records every line the child receives (in order) before echoing
    // back only the lines carrying an "id" (a real MCP server never
    // replies to a notification).
    let command = format!(r#"tee -a {log_path} | grep --line-buffered '"id"'"#);
    let state = StatelessAdapterState::new(command, "2024-11-05".to_string());
    let app = router(state, "/mcp");

    let body = serde_json::to_vec(&json!({"jsonrpc":"2.0","id":1,"method":"tools/list"})).unwrap();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();

    let response = tokio::time::timeout(std::time::Duration::from_secs(5), app.oneshot(request))
        .await
        .expect("request timed out")
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let reply: JsonRpcMessage = serde_json::from_slice(&body).unwrap();
    assert_eq!(reply.id(), Some(&json!(1)));

    // Give the killed child's writes a moment to land on disk.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let logged = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = logged.lines().filter(|l| !l.trim().is_empty()).collect();

    assert_eq!(
        lines.len(),
        3,
        "expected [initialize, notifications/initialized, tools/list] on child stdin, got {lines:?}"
    );
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["method"], "initialize");
    assert!(first["id"].as_str().unwrap().starts_with("init_"));
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["method"], "notifications/initialized");
    let third: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(third["method"], "tools/list");
    assert_eq!(third["id"], 1);
}
