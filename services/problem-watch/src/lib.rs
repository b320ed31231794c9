//! Problem watch - dashboard alert relay
//!
//! Logs in to a monitoring dashboard, reads the active problem list, picks
//! the alerts worth forwarding and relays them through the local message
//! gateway, remembering which ones were already sent.

pub mod alert;
pub mod cache;
#[cfg(feature = "chromium")]
pub mod chromium;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod driver;
pub mod duration;
pub mod eligibility;
pub mod error;
pub mod extractor;
pub mod gateway_client;
pub mod io;
pub mod notifier;
pub mod pipeline;
pub mod session;

pub use config::{load_config, Config};
pub use error::{Result, WatchError};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::JsonFileKeyStore;
use crate::driver::DriverLauncher;
use crate::gateway_client::GatewayNotifier;
use crate::io::ReqwestHttpClient;
use crate::pipeline::Pipeline;

/// Wire the production collaborators around a launcher
pub fn build_pipeline(config: Config, launcher: Arc<dyn DriverLauncher>) -> Result<Pipeline> {
    let http = ReqwestHttpClient::with_timeout(Duration::from_secs(
        config.gateway.request_timeout_seconds,
    ))?;
    let notifier = Arc::new(GatewayNotifier::new(&config.gateway, Arc::new(http)));
    let store = Arc::new(JsonFileKeyStore::new(&config.cache.path));
    Ok(Pipeline::new(config, launcher, store, notifier))
}

#[cfg(feature = "chromium")]
fn default_launcher(config: &Config) -> Result<Arc<dyn DriverLauncher>> {
    Ok(Arc::new(chromium::ChromiumLauncher::new(
        config.browser.clone(),
    )))
}

#[cfg(not(feature = "chromium"))]
fn default_launcher(_config: &Config) -> Result<Arc<dyn DriverLauncher>> {
    Err(WatchError::Config(
        "built without the `chromium` feature; no session driver available".to_string(),
    ))
}

/// Run the pipeline once, or repeatedly with `interval` between runs
pub async fn run(config: Config, interval: Option<Duration>) -> Result<()> {
    let launcher = default_launcher(&config)?;
    let pipeline = build_pipeline(config, launcher)?;

    let Some(interval) = interval else {
        pipeline.run_once().await?;
        return Ok(());
    };

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    run_loop(&pipeline, interval, cancel).await;
    Ok(())
}

/// Run back-to-back polls until cancelled
///
/// A run in progress is allowed to finish, so the cache is always persisted.
pub async fn run_loop(pipeline: &Pipeline, interval: Duration, cancel: CancellationToken) -> usize {
    let mut runs = 0;
    while !cancel.is_cancelled() {
        runs += 1;
        if let Err(e) = pipeline.run_once().await {
            tracing::error!("Run {} failed: {}", runs, e);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }
    tracing::info!("Stopped after {} runs", runs);
    runs
}
