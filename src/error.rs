//! Error types for the bridge.
//!
//! Mirrors the split in the teacher crate between a broad top-level error
//! (anything that can abort the process at startup) and a narrow
//! subsystem error (`TransportError`) returned by per-operation transport
//! calls.

use thiserror::Error;

/// Top-level error type for `mcpbridge` operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// CLI argument or multi-server config validation failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The process could not start (bind failure, bad command, etc).
    #[error("startup error: {0}")]
    Startup(String),

    /// A transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for top-level bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by an individual transport adapter or the child
/// supervisor.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not be established (bind/connect failure).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The transport was closed while an operation was in flight.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;
