//! Multi-server config business-rule validation (spec §6), separate from
//! parsing in [`super::loader`].

use crate::error::BridgeError;

use super::schema::MultiServerConfig;

/// Validates and normalizes a parsed [`MultiServerConfig`].
///
/// - An empty `servers` array is rejected.
/// - Each entry requires non-empty `path` and `stdio`.
/// - `path` is left-padded with `/` if missing.
///
/// # Errors
///
/// Returns [`BridgeError::Config`] describing the first rule violated.
pub fn validate_multi_server_config(mut config: MultiServerConfig) -> Result<MultiServerConfig, BridgeError> {
    if config.servers.is_empty() {
        return Err(BridgeError::Config("multiServerConfig: 'servers' must not be empty".into()));
    }

    for entry in &mut config.servers {
        if entry.path.trim().is_empty() {
            return Err(BridgeError::Config("multiServerConfig: entry has empty 'path'".into()));
        }
        if entry.stdio.trim().is_empty() {
            return Err(BridgeError::Config(format!(
                "multiServerConfig: entry '{}' has empty 'stdio'",
                entry.path
            )));
        }
        if !entry.path.starts_with('/') {
            entry.path = format!("/{}", entry.path);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServerEntry;

    fn config(entries: Vec<(&str, &str)>) -> MultiServerConfig {
        MultiServerConfig {
            servers: entries
                .into_iter()
                .map(|(path, stdio)| ServerEntry { path: path.to_string(), stdio: stdio.to_string() })
                .collect(),
        }
    }

    #[test]
    fn empty_servers_rejected() {
        let result = validate_multi_server_config(config(vec![]));
        assert!(result.is_err());
    }

    #[test]
    fn empty_path_rejected() {
        let result = validate_multi_server_config(config(vec![("", "git-mcp")]));
        assert!(result.is_err());
    }

    #[test]
    fn empty_stdio_rejected() {
        let result = validate_multi_server_config(config(vec![("/git", "")]));
        assert!(result.is_err());
    }

    #[test]
    fn path_is_left_padded_with_slash() {
        let result = validate_multi_server_config(config(vec![("git", "git-mcp")])).unwrap();
        assert_eq!(result.servers[0].path, "/git");
    }

    #[test]
    fn already_prefixed_path_is_unchanged() {
        let result = validate_multi_server_config(config(vec![("/git", "git-mcp")])).unwrap();
        assert_eq!(result.servers[0].path, "/git");
    }
}
