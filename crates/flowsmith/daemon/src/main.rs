//! Flowsmith Daemon - flow generation and validation service
//!
//! The daemon provides:
//! - REST API for generating, repairing, validating and publishing flows
//! - A converge loop that repairs until the validator accepts
//! - Pluggable model and validator backends

use clap::Parser;
use flowsmith_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Flowsmith Daemon CLI
#[derive(Parser)]
#[command(name = "flowsmithd")]
#[command(about = "Flowsmith Daemon - flow generation and validation service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FLOWSMITH_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the config file
    #[arg(short, long, env = "FLOWSMITH_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "FLOWSMITH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "FLOWSMITH_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "Starting flowsmith daemon"
    );

    let server = Server::new(config)?;
    server.run().await
}
