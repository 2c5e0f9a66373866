//! npmx connector
//!
//! Runs on the local machine and executes npm account operations queued by
//! the npmx web UI, after the user approves them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use npmx_connector::{server, ConnectorState, NpmExecutor};
use npmx_core::config::{self, ConnectorConfig};

#[derive(Parser)]
#[command(name = "npmx-connector")]
#[command(about = "Local connector for npmx npm account management")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "NPMX_CONNECTOR_PORT")]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config: ConnectorConfig = match &args.config {
        Some(config_path) => config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?,
        None => {
            let default_path = config::default_config_path();
            config::load_optional_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring config at {:?}: {}", default_path, e);
                ConnectorConfig::default()
            })
        }
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate().context("Invalid configuration")?;

    let executor = Arc::new(NpmExecutor::from_config(&config));
    let state = Arc::new(ConnectorState::new(config, executor));

    let bind_addr = state.config.bind_address();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    println!();
    println!("  npmx connector is running.");
    println!("  Open this link to connect the web UI:");
    println!();
    println!("    {}", state.config.connect_url(&state.token()));
    println!();

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        cancel_clone.cancel();
    });

    server::serve(listener, state, cancel).await?;

    tracing::info!("Connector shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
