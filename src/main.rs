//! Reverse tunnel client.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                     TUNNEL CLIENT                         │
//!                  │                                                           │
//!    Broker        │  ┌─────────┐    ┌─────────┐    ┌──────────┐               │
//!  ◀───────────────┼──│  pool   │───▶│ session │───▶│  router  │──── ping ──┐  │
//!    (outbound     │  │ (dial)  │    │ (wire)  │    └────┬─────┘            │  │
//!     TCP, N×)     │  └─────────┘    └────▲────┘         │                  │  │
//!                  │                      │              ▼                  │  │
//!                  │                      │        ┌───────────┐            │  │
//!                  │                      │        │ forwarder │────────────┼──┼──▶ Local
//!                  │                      │        └─────┬─────┘            │  │    backend
//!                  │                      │              ▼                  │  │
//!                  │                      │        ┌───────────┐            │  │
//!                  │                      └────────│ response  │◀───────────┘  │
//!                  │                               └───────────┘               │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use reverse_tunnel::config::loader::{read_config, ConfigError};
use reverse_tunnel::config::validation::{config_warnings, validate_config};
use reverse_tunnel::lifecycle::signals::wait_for_signal;
use reverse_tunnel::observability::{logging, metrics};
use reverse_tunnel::{ClientConfig, Shutdown, Tunnel};

#[derive(Debug, Parser)]
#[command(name = "reverse-tunnel", version, about = "Expose a local HTTP service through a tunnel broker")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "TUNNEL_CONFIG")]
    config: Option<PathBuf>,

    /// Broker address (host:port)
    #[arg(long)]
    remote: Option<String>,

    /// Local backend, e.g. http://127.0.0.1:8080
    #[arg(long)]
    local: Option<String>,

    /// Shared secret sent at the start of every tunnel connection
    #[arg(long, env = "TUNNEL_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Host header override for backend requests
    #[arg(long)]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(remote) = self.remote {
            config.tunnel.remote = remote;
        }
        if let Some(local) = self.local {
            config.tunnel.local = local;
        }
        if let Some(secret) = self.secret {
            config.tunnel.secret = Some(secret);
        }
        if let Some(host) = self.host {
            config.tunnel.host = Some(host);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ClientConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!("reverse-tunnel v{} starting", env!("CARGO_PKG_VERSION"));
    for warning in config_warnings(&config) {
        tracing::warn!(%warning, "Configuration value adjusted");
    }
    tracing::info!(
        remote = %config.tunnel.remote,
        local = %config.tunnel.local,
        secret = config.tunnel.secret().is_some(),
        host_override = ?config.tunnel.host_override(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let tunnel = Tunnel::new(config)?;
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    tunnel.run(signal).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
