//! Multi-server configuration: loading and validating `--multiServerConfig`
//! JSON files (spec §6).

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::load_multi_server_config;
pub use schema::{MultiServerConfig, ServerEntry};
pub use validation::validate_multi_server_config;
