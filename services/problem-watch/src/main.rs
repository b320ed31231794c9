//! Problem watch CLI
//!
//! Polls the monitoring dashboard and relays new alerts to chat.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use problem_watch::{load_config, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "problem-watch")]
#[command(about = "Relay new monitoring dashboard problems to chat")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Poll repeatedly with this many seconds between runs instead of once
    #[arg(long)]
    interval_seconds: Option<u64>,

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
        "Parsed command line arguments: config={:?}, interval_seconds={:?}, log_level={:?}",
        args.config,
        args.interval_seconds,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.resolve_secrets()?;

    tracing::info!("Starting problem watch against {}", config.dashboard.login_url);
    tracing::debug!(
        "Window ({}, {}] min, massive threshold {}, cache {:?}",
        config.eligibility.min_duration_minutes,
        config.eligibility.max_duration_minutes,
        config.eligibility.massive_threshold,
        config.cache.path
    );

    problem_watch::run(config, args.interval_seconds.map(Duration::from_secs)).await?;

    tracing::info!("Alert processing finished");
    Ok(())
}
