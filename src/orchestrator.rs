//! Bridge Orchestrator (spec §4.10/§4.11).
//!
//! Wires each configured binding's `Child` + transport adapter into one
//! `axum::Router`, installs the cross-cutting middleware (`--cors`,
//! `--header`/`--oauth2Bearer`, `--healthEndpoint`), and runs the server
//! alongside a signal-driven graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::adapters::reverse::{run_sse_to_stdio, run_streamable_http_to_stdio};
use crate::adapters::sse::SseAdapterState;
use crate::adapters::streamable_stateful::StatefulAdapterState;
use crate::adapters::streamable_stateless::StatelessAdapterState;
use crate::adapters::websocket::WebSocketAdapterState;
use crate::binding::ServerBinding;
use crate::child::Child;
use crate::cli::{Mode, OutputTransport, ParsedCli, ReverseKind};
use crate::error::{BridgeError, Result};
use crate::router::full_path;

/// Runs the bridge to completion per the resolved CLI mode.
///
/// # Errors
///
/// Returns [`BridgeError`] if a required child or listener cannot be
/// started.
pub async fn run(parsed: ParsedCli) -> Result<()> {
    match parsed.mode {
        Mode::Forward { .. } => run_forward(parsed).await,
        Mode::Reverse { ref url, kind } => run_reverse(url.clone(), kind, &parsed).await,
    }
}

async fn run_reverse(url: String, kind: ReverseKind, parsed: &ParsedCli) -> Result<()> {
    let headers = parsed.headers.clone();
    match kind {
        ReverseKind::Sse => run_sse_to_stdio(&url, &headers).await,
        ReverseKind::StreamableHttp => run_streamable_http_to_stdio(&url, &headers).await,
    }
}

async fn run_forward(parsed: ParsedCli) -> Result<()> {
    let Mode::Forward { bindings, output, stateful } = parsed.mode.clone() else {
        unreachable!("run_forward only called for Mode::Forward");
    };

    let mut router = Router::new();
    let mut children: Vec<Arc<Child>> = Vec::new();
    let mut health_checks: Vec<HealthCheck> = Vec::new();

    for binding in &bindings {
        let (binding_router, child, check) = mount_binding(binding, output, stateful, &parsed)?;
        if let Some(child) = child {
            children.push(child);
        }
        if let Some(check) = check {
            health_checks.push(check);
        }
        router = router.nest(&binding.prefix, binding_router);
    }

    if !parsed.health_endpoints.is_empty() {
        let health_checks = Arc::new(health_checks);
        let mut health_router = Router::new();
        for path in &parsed.health_endpoints {
            health_router = health_router.route(path, get(health_handler));
        }
        router = router.merge(health_router.with_state(health_checks));
    }

    router = apply_header_injection(router, parsed.headers.clone());
    router = router.layer(cors_layer(&parsed.cors));
    router = router.layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", parsed.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Startup(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, bindings = bindings.len(), "mcpbridge listening");

    // In single-binding SSE 1:1 mode the whole process exits with the
    // child's own exit code once it dies, matching a stdio server's
    // lifetime being the process lifetime (spec §4.2/§8).
    if couples_process_lifetime_to_child(bindings.len(), output) {
        if let Some(child) = children.first().cloned() {
            tokio::spawn(async move {
                let mut exit_rx = child.exit_receiver();
                if exit_rx.changed().await.is_ok() {
                    if let Some(info) = *exit_rx.borrow() {
                        error!(?info, "supervised child exited, shutting down bridge");
                        std::process::exit(info.process_exit_code());
                    }
                }
            });
        }
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BridgeError::Startup(format!("server error: {e}")))?;

    for child in children {
        child.kill().await;
    }

    Ok(())
}

/// True when the 1:1 SSE child-death-exits-process coupling applies
/// (spec §4.2/§8 scenario 5): exactly one binding, SSE output. A
/// conscious coupling, not promoted to recovery semantics even with
/// multiple bindings or other output transports.
#[must_use]
pub fn couples_process_lifetime_to_child(binding_count: usize, output: OutputTransport) -> bool {
    binding_count == 1 && matches!(output, OutputTransport::Sse)
}

/// A binding's liveness probe: `true` while every `Child`/session it
/// supervises is still alive (spec §4.8/§6).
type HealthCheck = Arc<dyn Fn() -> bool + Send + Sync>;

fn mount_binding(
    binding: &ServerBinding,
    output: OutputTransport,
    stateful: bool,
    parsed: &ParsedCli,
) -> Result<(Router, Option<Arc<Child>>, Option<HealthCheck>)> {
    match output {
        OutputTransport::Sse => {
            let child = Arc::new(Child::spawn(&binding.command)?);
            let message_prefix = parsed
                .base_url
                .as_deref()
                .map_or_else(|| full_path(&binding.prefix, &parsed.message_path), |base| {
                    format!("{base}{}", ensure_leading_on_base(&parsed.message_path))
                });
            let state = SseAdapterState::new(Arc::clone(&child), message_prefix, binding.prefix.clone());
            let router = crate::adapters::sse::router(state, &parsed.sse_path, &parsed.message_path);
            let check_child = Arc::clone(&child);
            let check: HealthCheck = Arc::new(move || !check_child.has_exited());
            Ok((router, Some(child), Some(check)))
        }
        OutputTransport::Ws => {
            let child = Arc::new(Child::spawn(&binding.command)?);
            let state = WebSocketAdapterState::new(Arc::clone(&child));
            let router = crate::adapters::websocket::router(state, &parsed.message_path);
            let check_state = Arc::clone(&state);
            let check: HealthCheck = Arc::new(move || check_state.is_healthy());
            Ok((router, Some(child), Some(check)))
        }
        OutputTransport::StreamableHttp if stateful => {
            let state = StatefulAdapterState::new(binding.command.clone(), parsed.session_timeout, binding.prefix.clone());
            let router = crate::adapters::streamable_stateful::router(Arc::clone(&state), &parsed.streamable_http_path);
            let check: HealthCheck = Arc::new(move || state.is_healthy());
            Ok((router, None, Some(check)))
        }
        OutputTransport::StreamableHttp => {
            let state = StatelessAdapterState::new(binding.command.clone(), parsed.protocol_version.clone());
            let router = crate::adapters::streamable_stateless::router(state, &parsed.streamable_http_path);
            // No persistent child to supervise between requests.
            Ok((router, None, None))
        }
        OutputTransport::Stdio => Err(BridgeError::Config(
            "--outputTransport stdio is only valid for reverse (--sse/--streamableHttp) modes".into(),
        )),
    }
}

fn ensure_leading_on_base(suffix: &str) -> String {
    crate::router::ensure_leading(suffix)
}

async fn health_handler(axum::extract::State(checks): axum::extract::State<Arc<Vec<HealthCheck>>>) -> Response {
    if checks.iter().all(|check| check()) {
        (axum::http::StatusCode::OK, "ok").into_response()
    } else {
        (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "unhealthy").into_response()
    }
}

fn cors_layer(rules: &[crate::cli::CorsRule]) -> CorsLayer {
    use crate::cli::CorsRule;

    if rules.is_empty() {
        return CorsLayer::new();
    }
    if rules.iter().any(|r| matches!(r, CorsRule::AllowAll)) {
        return CorsLayer::permissive();
    }

    let rules = rules.to_vec();
    let allow_origin = AllowOrigin::predicate(move |origin, _parts| {
        let Ok(origin_str) = origin.to_str() else { return false };
        rules.iter().any(|rule| match rule {
            CorsRule::AllowAll => true,
            CorsRule::Exact(s) => s == origin_str,
            CorsRule::Regex(re) => re.is_match(origin_str),
        })
    });
    CorsLayer::new().allow_origin(allow_origin)
}

fn apply_header_injection(router: Router, headers: Vec<(HeaderName, HeaderValue)>) -> Router {
    if headers.is_empty() {
        return router;
    }
    let headers = Arc::new(headers);
    router.layer(middleware::from_fn(move |request: Request, next: Next| {
        let headers = Arc::clone(&headers);
        async move {
            let mut response: Response = next.run(request).await;
            for (name, value) in headers.iter() {
                response.headers_mut().insert(name.clone(), value.clone());
            }
            response
        }
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received, draining connections");
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CorsRule;

    #[test]
    fn cors_empty_rules_has_no_allow_origin_header_by_default() {
        // CorsLayer::new() without allow_origin configured sends no ACAO
        // header, which is the right default when --cors was never passed.
        let _layer = cors_layer(&[]);
    }

    #[test]
    fn cors_allow_all_builds_without_panicking() {
        let _layer = cors_layer(&[CorsRule::AllowAll]);
    }

    #[test]
    fn process_lifetime_coupling_requires_single_sse_binding() {
        assert!(couples_process_lifetime_to_child(1, OutputTransport::Sse));
        assert!(!couples_process_lifetime_to_child(2, OutputTransport::Sse));
        assert!(!couples_process_lifetime_to_child(1, OutputTransport::Ws));
        assert!(!couples_process_lifetime_to_child(1, OutputTransport::StreamableHttp));
    }
}
