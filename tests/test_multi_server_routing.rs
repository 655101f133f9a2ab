//! End-to-end scenario 4 (spec §8): bindings nested under distinct path
//! prefixes route requests only to their own child.

use axum::Router;
use mcpbridge::adapters::streamable_stateless::{router, StatelessAdapterState};
use serde_json::json;
use tower::ServiceExt;

fn tagging_echo(tag: &str) -> String {
    // Unbuffered line-substitution stand-in for a real MCP server: it
    // rewrites its own tag into whatever it receives so a test can tell
    // which binding's child actually handled a request.
    format!("sed -u 's/add/{tag}/'")
}

#[tokio::test]
async fn requests_are_routed_to_the_binding_matching_their_path_prefix() {
    let git_state = StatelessAdapterState::new(tagging_echo("GIT_SERVER"), "2024-11-05".to_string());
    let docker_state = StatelessAdapterState::new(tagging_echo("DOCKER_SERVER"), "2024-11-05".to_string());

    let app = Router::new()
        .nest("/git", router(git_state, "/mcp"))
        .nest("/docker", router(docker_state, "/mcp"));

    let call = |body: Vec<u8>| {
        axum::http::Request::builder()
            .method("POST")
            .uri("/git/mcp")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .unwrap()
    };

    let body = serde_json::to_vec(&json!({"jsonrpc":"2.0","id":1,"method":"add","params":{"a":1,"b":2}})).unwrap();
    let git_response = tokio::time::timeout(std::time::Duration::from_secs(5), app.clone().oneshot(call(body)))
        .await
        .expect("git request timed out")
        .unwrap();
    let git_body = axum::body::to_bytes(git_response.into_body(), usize::MAX).await.unwrap();
    let git_text = String::from_utf8_lossy(&git_body);
    assert!(git_text.contains("GIT_SERVER"), "expected git-mcp's reply, got {git_text}");
    assert!(!git_text.contains("DOCKER_SERVER"));

    let body = serde_json::to_vec(&json!({"jsonrpc":"2.0","id":2,"method":"add","params":{"a":1,"b":2}})).unwrap();
    let docker_request = axum::http::Request::builder()
        .method("POST")
        .uri("/docker/mcp")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();
    let docker_response = tokio::time::timeout(std::time::Duration::from_secs(5), app.oneshot(docker_request))
        .await
        .expect("docker request timed out")
        .unwrap();
    let docker_body = axum::body::to_bytes(docker_response.into_body(), usize::MAX).await.unwrap();
    let docker_text = String::from_utf8_lossy(&docker_body);
    assert!(docker_text.contains("DOCKER_SERVER"), "expected docker-mcp's reply, got {docker_text}");
    assert!(!docker_text.contains("GIT_SERVER"));
}
