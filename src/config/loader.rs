//! Multi-server config loading: a pure parse step, paired with the
//! validation pass in [`super::validation`]. Mirrors the teacher's
//! `config::loader` / `config::validation` split.

use std::path::Path;

use crate::error::BridgeError;

use super::schema::MultiServerConfig;

/// Reads and parses a `--multiServerConfig` JSON file.
///
/// Does not validate business rules (non-empty `servers`, non-empty
/// `path`/`stdio` per entry) — see
/// [`super::validation::validate_multi_server_config`].
///
/// # Errors
///
/// Returns [`BridgeError::Config`] if the file cannot be read or does not
/// parse as the expected JSON shape.
pub fn load_multi_server_config(path: &Path) -> Result<MultiServerConfig, BridgeError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| BridgeError::Config(format!("invalid multi-server config {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"servers":[{{"path":"/git","stdio":"git-mcp"}}]}}"#).unwrap();
        let config = load_multi_server_config(file.path()).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].path, "/git");
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = load_multi_server_config(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn malformed_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let result = load_multi_server_config(file.path());
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }
}
