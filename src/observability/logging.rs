//! Logging initialization.
//!
//! Structured logging via `tracing`, with human-readable and JSON output
//! formats and environment-based override via `MCPBRIDGE_LOG_LEVEL`.
//! Mirrors the teacher's `observability::logging` module.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Maps to `--logLevel debug|info|none` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    None,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Initializes the global tracing subscriber.
///
/// `MCPBRIDGE_LOG_LEVEL` takes precedence over `level` if set. Uses
/// `try_init()` so calling this more than once (e.g. in tests) is safe.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let default_directive = match level {
        LogLevel::None => "off",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
    };

    let filter = EnvFilter::try_from_env("MCPBRIDGE_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn log_level_default_is_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn init_logging_does_not_panic() {
        init_logging(LogFormat::Human, LogLevel::None);
        init_logging(LogFormat::Json, LogLevel::Debug);
    }
}
