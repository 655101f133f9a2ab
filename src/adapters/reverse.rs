//! Reverse Adapters (spec §4.9): `SSE → stdio` and `Streamable-HTTP →
//! stdio`. The bridge dials a remote MCP endpoint and exposes it on its
//! own stdio to the invoking parent — the inverse of every other
//! adapter, and the only place this binary's own stdin/stdout are the
//! "local" transport rather than a spawned child's.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use eventsource_client::{Client, SSE};
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap as ReqwestHeaderMap, HeaderName as ReqwestHeaderName, HeaderValue as ReqwestHeaderValue};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::error::BridgeError;
use crate::framing::LineFramer;
use crate::jsonrpc::JsonRpcMessage;

fn to_reqwest_headers(headers: &[(HeaderName, HeaderValue)]) -> ReqwestHeaderMap {
    let mut map = ReqwestHeaderMap::new();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            ReqwestHeaderName::from_bytes(name.as_str().as_bytes()),
            ReqwestHeaderValue::from_bytes(value.as_bytes()),
        ) {
            map.insert(name, value);
        }
    }
    map
}

/// Writes a single JsonRpcMessage as one line to stdout, serializing
/// writes across the shared tasks that produce them.
async fn write_stdout_line(stdout: &Mutex<tokio::io::Stdout>, message: &JsonRpcMessage) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    let mut stdout = stdout.lock().await;
    stdout.write_all(&line).await?;
    stdout.flush().await
}

/// Reads local stdin, parsing each line into a `JsonRpcMessage` and
/// invoking `on_message` for it. Runs until stdin closes.
async fn read_stdin_loop(mut on_message: impl FnMut(JsonRpcMessage)) {
    let mut stdin = tokio::io::stdin();
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 8192];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for message in framer.feed(&buf[..n]) {
                    on_message(message);
                }
            }
            Err(e) => {
                error!(error = %e, "error reading local stdin");
                break;
            }
        }
    }
}

/// `SSE → stdio`: subscribes to the remote SSE stream, captures the
/// `endpoint` event's message URL, and POSTs local stdin traffic there.
///
/// # Errors
///
/// Returns [`BridgeError::Startup`] if the initial connection cannot be
/// established.
pub async fn run_sse_to_stdio(url: &str, headers: &[(HeaderName, HeaderValue)]) -> Result<(), BridgeError> {
    let mut builder = eventsource_client::ClientBuilder::for_url(url)
        .map_err(|e| BridgeError::Startup(format!("invalid SSE URL {url}: {e}")))?;
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (name.to_str(), value.to_str()) {
            builder = builder.header(name, value).map_err(|e| BridgeError::Startup(e.to_string()))?;
        }
    }
    let client = builder.build();

    let message_url: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let http_headers = to_reqwest_headers(headers);
    let http_client = reqwest::Client::new();

    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
    let stdin_message_url = Arc::clone(&message_url);
    let stdin_http_client = http_client.clone();
    let stdin_headers = http_headers.clone();

    tokio::spawn(async move {
        loop {
            let url = { stdin_message_url.lock().await.clone() };
            if url.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let url = stdin_message_url.lock().await.clone().expect("checked above");
        read_stdin_loop(move |message| {
            let url = url.clone();
            let client = stdin_http_client.clone();
            let headers = stdin_headers.clone();
            tokio::spawn(async move {
                if let Err(e) = client.post(&url).headers(headers).json(&message).send().await {
                    warn!(error = %e, "failed to POST local message to remote SSE endpoint");
                }
            });
        })
        .await;
    });

    let mut stream = client.stream();
    while let Ok(Some(event)) = stream.try_next().await {
        match event {
            SSE::Event(e) if e.event_type == "endpoint" => {
                *message_url.lock().await = Some(resolve_endpoint(url, &e.data));
            }
            SSE::Event(e) => match serde_json::from_str::<JsonRpcMessage>(&e.data) {
                Ok(message) => {
                    if let Err(err) = write_stdout_line(&stdout, &message).await {
                        error!(error = %err, "failed to write remote message to stdout");
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "dropping non-JSON-RPC SSE event"),
            },
            SSE::Comment(_) | SSE::Connected(_) => {}
        }
    }

    Ok(())
}

fn resolve_endpoint(base: &str, endpoint: &str) -> String {
    reqwest::Url::parse(base)
        .and_then(|b| b.join(endpoint))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| endpoint.to_string())
}

/// `Streamable-HTTP → stdio`: POSTs each local stdin message to the
/// remote endpoint and writes its response to local stdout, carrying
/// forward the `Mcp-Session-Id` header once the remote assigns one.
///
/// # Errors
///
/// Returns [`BridgeError::Transport`] if the remote connection fails.
pub async fn run_streamable_http_to_stdio(url: &str, headers: &[(HeaderName, HeaderValue)]) -> Result<(), BridgeError> {
    let client = reqwest::Client::new();
    let base_headers = to_reqwest_headers(headers);
    let session_id: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
    let url = url.to_string();

    read_stdin_loop(move |message| {
        let client = client.clone();
        let mut headers = base_headers.clone();
        let session_id = Arc::clone(&session_id);
        let stdout = Arc::clone(&stdout);
        let url = url.clone();
        tokio::spawn(async move {
            if let Some(id) = session_id.lock().await.clone() {
                if let Ok(value) = ReqwestHeaderValue::from_str(&id) {
                    headers.insert(ReqwestHeaderName::from_static("mcp-session-id"), value);
                }
            }
            let response = match client.post(&url).headers(headers).json(&message).send().await {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "Streamable-HTTP reverse request failed");
                    return;
                }
            };
            if let Some(id) = response.headers().get("mcp-session-id").and_then(|v| v.to_str().ok()) {
                *session_id.lock().await = Some(id.to_string());
            }
            match response.json::<JsonRpcMessage>().await {
                Ok(reply) => {
                    if let Err(e) = write_stdout_line(&stdout, &reply).await {
                        error!(error = %e, "failed to write remote reply to stdout");
                    }
                }
                Err(e) => warn!(error = %e, "remote reply was not a valid JSON-RPC message"),
            }
        });
    })
    .await;

    Ok(())
}
