//! `ServerBinding` and `ServerMetadata` (spec §3).

use serde::Serialize;

/// One `(url-prefix, child-command)` pair, immutable once constructed at
/// startup from CLI flags or a multi-server config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBinding {
    /// Path prefix. Begins with `/`; never has a trailing `/` except the
    /// root binding itself (`/`).
    pub prefix: String,
    /// Shell command string run through `sh -c` / `cmd /c`.
    pub command: String,
}

impl ServerBinding {
    /// Builds a binding, normalizing `prefix` to start with `/`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, command: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.starts_with('/') { prefix } else { format!("/{prefix}") };
        Self { prefix, command: command.into() }
    }
}

/// Passive metadata describing the MCP server instance a binding fronts.
/// Holds no behavior: it exists so the `initialize` auto-handshake (and
/// any future capability negotiation) has something to report.
///
/// Instantiated once per binding in forward streaming modes, and once per
/// POST in stateless mode (spec §4.7's per-request singleton rule).
#[derive(Debug, Clone, Serialize)]
pub struct ServerMetadata {
    pub name: String,
    pub version: String,
    pub capabilities: ServerCapabilities,
}

/// Capabilities advertised in the auto-initialize handshake's response
/// metadata and in the `clientInfo` the interposer sends.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    pub roots: RootsCapability,
    pub sampling: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RootsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

impl Default for ServerMetadata {
    fn default() -> Self {
        Self {
            name: "mcpbridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: ServerCapabilities {
                roots: RootsCapability { list_changed: true },
                sampling: serde_json::Map::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_adds_leading_slash() {
        let binding = ServerBinding::new("git", "git-mcp");
        assert_eq!(binding.prefix, "/git");
    }

    #[test]
    fn new_preserves_existing_leading_slash() {
        let binding = ServerBinding::new("/git", "git-mcp");
        assert_eq!(binding.prefix, "/git");
    }

    #[test]
    fn default_metadata_advertises_list_changed_roots() {
        let metadata = ServerMetadata::default();
        assert!(metadata.capabilities.roots.list_changed);
    }
}
