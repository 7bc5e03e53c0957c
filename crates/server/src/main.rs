mod bootstrap;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use readycheck_core::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(name = "readycheck-server", version, about = "Group session scheduling bot")]
struct ServerArgs {
    /// Configuration file. Falls back to readycheck.toml, then
    /// config/readycheck.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_logging(config: &AppConfig) {
    use readycheck_core::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let args = ServerArgs::parse();

    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions {
        require_file: args.config.is_some(),
        config_path: args.config,
        ..LoadOptions::default()
    })?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    tracing::info!(
        event_name = "system.server.transport_mode",
        transport_mode = app.transport_mode,
        "chat transport mode initialized"
    );
    tracing::info!(event_name = "system.server.started", "readycheck-server started");

    tokio::select! {
        outcome = app.runner.start() => outcome?,
        signal = wait_for_shutdown() => {
            signal?;
            tracing::info!(event_name = "system.server.stopping", "shutdown signal received");
        }
    }

    if let Err(failure) = app.transport.disconnect().await {
        tracing::warn!(
            event_name = "system.server.disconnect_failed",
            error = %failure,
            "transport did not close cleanly"
        );
    }
    tracing::info!(event_name = "system.server.stopped", "readycheck-server stopped");

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
