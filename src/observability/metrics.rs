//! Metrics collection.
//!
//! Prometheus-compatible counters/gauges for connection and message
//! traffic, modeled on the teacher's `observability::metrics` module
//! (double-init guard, `describe_*` registration up front).

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::BridgeError;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Known MCP method names used for label cardinality protection. Methods
/// outside this list are bucketed as `"__unknown__"`.
const KNOWN_METHODS: [&str; 10] = [
    "initialize",
    "ping",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/read",
    "prompts/list",
    "prompts/get",
    "notifications/initialized",
    "response",
];

/// Sanitizes a method name for use as a metrics label.
#[must_use]
pub fn sanitize_method_label(method: &str) -> &str {
    if KNOWN_METHODS.contains(&method) {
        method
    } else {
        "__unknown__"
    }
}

/// Initializes the global metrics recorder. When `port` is `Some`, a
/// Prometheus HTTP listener is started on `127.0.0.1:<port>`.
///
/// # Errors
///
/// Returns [`BridgeError::Io`] if the recorder cannot be installed.
pub fn init_metrics(port: Option<u16>) -> Result<(), BridgeError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| BridgeError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "mcpbridge_messages_child_to_network_total",
        "Messages forwarded from a child's stdout to the network side"
    );
    describe_counter!(
        "mcpbridge_messages_network_to_child_total",
        "Messages forwarded from the network side to a child's stdin"
    );
    describe_counter!("mcpbridge_framing_errors_total", "Non-JSON lines dropped by the line framer");
    describe_gauge!("mcpbridge_sessions_active", "Currently tracked sessions, per binding");
    describe_gauge!("mcpbridge_connections_active", "Currently open network connections");
    describe_counter!("mcpbridge_child_spawns_total", "Child processes spawned");
    describe_counter!("mcpbridge_child_exits_total", "Child process exits observed");
}

/// Records a message forwarded from the child to the network.
pub fn record_child_to_network(method_label: &str) {
    counter!("mcpbridge_messages_child_to_network_total", "method" => method_label.to_string())
        .increment(1);
}

/// Records a message forwarded from the network to the child.
pub fn record_network_to_child(method_label: &str) {
    counter!("mcpbridge_messages_network_to_child_total", "method" => method_label.to_string())
        .increment(1);
}

/// Records a dropped non-JSON line.
pub fn record_framing_error() {
    counter!("mcpbridge_framing_errors_total").increment(1);
}

/// Sets the active session gauge for a binding.
pub fn set_sessions_active(binding: &str, count: f64) {
    gauge!("mcpbridge_sessions_active", "binding" => binding.to_string()).set(count);
}

/// Records a child process spawn.
pub fn record_child_spawn() {
    counter!("mcpbridge_child_spawns_total").increment(1);
}

/// Records an observed child process exit.
pub fn record_child_exit() {
    counter!("mcpbridge_child_exits_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_method_passes_through() {
        assert_eq!(sanitize_method_label("tools/call"), "tools/call");
    }

    #[test]
    fn unknown_method_is_bucketed() {
        assert_eq!(sanitize_method_label("arbitrary/attacker_method"), "__unknown__");
    }
}
