//! `mcpbridge` binary entry point.

use clap::Parser;

use mcpbridge::cli::Cli;
use mcpbridge::observability::{init_logging, init_metrics, LogFormat};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(LogFormat::Human, cli.log_level);
    if let Err(e) = init_metrics(None) {
        tracing::warn!(error = %e, "metrics recorder failed to initialize, continuing without it");
    }

    let parsed = match cli.validate() {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = mcpbridge::orchestrator::run(parsed).await {
        tracing::error!(error = %e, "mcpbridge exited with an error");
        std::process::exit(1);
    }
}
