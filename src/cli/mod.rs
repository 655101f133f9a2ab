//! CLI parsing and semantic validation (spec §6).

pub mod args;

pub use args::{Cli, CorsRule, Mode, OutputTransport, ParsedCli, ReverseKind};
