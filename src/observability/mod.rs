//! Logging and metrics initialization.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LogLevel};
pub use metrics::init_metrics;
