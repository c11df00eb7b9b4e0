//! # mnemo
//!
//! Hub binary: loads `.env`, parses configuration, installs telemetry,
//! serves the hub until Ctrl-C, then shuts down gracefully.

mod config;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use mnemo_server::MnemoServer;
use mnemo_telemetry::LogFormat;
use tracing::{debug, info};

use crate::config::{load_env_file, Config, ENV_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = load_env_file(Path::new(ENV_FILE));
    let config = Config::parse();

    let telemetry = config.telemetry();
    mnemo_telemetry::init_telemetry(&telemetry).context("failed to initialize telemetry")?;
    match env_file {
        Ok(path) => debug!(path = %path.display(), "loaded env file"),
        Err(e) => debug!(error = %e, "no env file loaded"),
    }
    if telemetry.format == LogFormat::Dev {
        mnemo_telemetry::log_config(&config.fields());
    }

    let server = MnemoServer::new(config.server());
    let (addr, handle) = server.listen().await.context("failed to start server")?;
    info!(listen_address = %addr, version = env!("CARGO_PKG_VERSION"), "mnemo ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    server.graceful_shutdown(vec![handle]).await;
    info!("shutdown complete");
    Ok(())
}
