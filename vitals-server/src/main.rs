//! vitals telemetry server.
//!
//! Loads `vitals.toml` (or defaults), opens the snapshot, and serves the
//! HTTP, SSE and WebSocket endpoints until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use vitals::Telemetry;
use vitals_server::config::{ServerConfig, SseMode};
use vitals_server::{AppState, serve};

/// vitals-server — Bounded telemetry store with live distribution.
#[derive(Parser)]
#[command(name = "vitals-server", version, about)]
struct Cli {
    /// Path to the TOML config file (default: config/vitals.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Path to the JSON snapshot file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "vitals=debug").
    #[arg(long)]
    log_level: Option<String>,

    /// Re-send the latest reading on an interval instead of pushing updates.
    #[arg(long)]
    sse_poll: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(db) = self.db {
            config.store.path = db;
        }
        if let Some(level) = self.log_level {
            config.server.log_level = level;
        }
        if self.sse_poll {
            config.sse.mode = SseMode::Poll;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("server failed: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (mut config, source) = ServerConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &source {
        Some(path) => tracing::info!(path = %path.display(), "config loaded"),
        None => tracing::info!("no config file found, using defaults"),
    }

    let telemetry = Telemetry::open(config.store_config(), config.broadcast_config())?;
    tracing::info!(
        snapshot = %config.store.path.display(),
        streams = ?telemetry.streams().await,
        "store opened"
    );

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, sse_mode = ?config.sse.mode, "server running");

    let state = AppState::new(telemetry, config.sse);
    serve(listener, state, shutdown_signal()).await?;

    tracing::info!("server exited cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
