//! Multi-server config JSON shape (spec §6).

use serde::Deserialize;

/// `{"servers":[{"path":"<str>","stdio":"<cmd>"}, …]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MultiServerConfig {
    pub servers: Vec<ServerEntry>,
}

/// One `(path, stdio command)` binding entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub path: String,
    pub stdio: String,
}
