//! # relayforge-server
//!
//! Lobby relay binary: parses flags and environment, installs the tracing
//! subscriber, and runs the relay until Ctrl-C.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use relayforge::{DEFAULT_PORT, RelayConfig, RelayServer};
use tracing_subscriber::EnvFilter;

/// WebSocket lobby relay for multiplayer web games.
#[derive(Parser, Debug)]
#[command(name = "relayforge-server", version, about)]
struct Cli {
    /// Host to bind.
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path WebSocket upgrades must use.
    #[arg(long, default_value = "/ws", conflicts_with = "any_ws_path")]
    ws_path: String,

    /// Accept WebSocket upgrades on any path.
    #[arg(long)]
    any_ws_path: bool,

    /// Give up on a single send to a single peer after this many milliseconds.
    #[arg(long, default_value_t = 5000)]
    send_timeout_ms: u64,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            ws_path: (!self.any_ws_path).then(|| self.ws_path.clone()),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            ..RelayConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.relay_config();
    let server = RelayServer::builder()
        .config(config.clone())
        .build()
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
