//! cfgplane control plane daemon.
//!
//! Discovers model plugins on the configured ports and reconciles submitted
//! transactions until interrupted.
//!
//! Usage:
//!   cfgplaned --config cfgplane.toml --plugin-port 5150 --plugin-port 5151 \
//!     --client-cert client.crt --client-key client.key

use anyhow::{Context, Result};
use cfgplane_daemon::{Args, Daemon};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = args.resolve()?;
    info!(
        plugin_ports = ?config.plugins.ports,
        workers = config.controller.workers,
        tls = config.plugins.client.tls.is_some(),
        "cfgplane starting"
    );

    let daemon = Daemon::new(&config)?;
    daemon.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    daemon.stop().await;
    Ok(())
}
