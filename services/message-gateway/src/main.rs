//! Message gateway CLI

use std::path::PathBuf;

use clap::Parser;
use message_gateway::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "message-gateway")]
#[command(about = "Loopback HTTP gateway relaying alerts to chat")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and API_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, port={:?}, log_level={:?}",
        args.config,
        args.port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if config.resolve_secrets()? {
        tracing::warn!("No API token configured");
        tracing::warn!("Generated token: {}", config.server.api_token);
        tracing::warn!("Set API_TOKEN to keep the same token across restarts");
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }

    message_gateway::run(config).await?;
    Ok(())
}
