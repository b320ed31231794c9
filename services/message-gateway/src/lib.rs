//! Message gateway - loopback HTTP relay to a chat bridge
//!
//! Accepts forward requests from local processes, checks origin, token,
//! size and shape, and hands them to a message sender.

pub mod config;
pub mod error;
pub mod io;
pub mod rate_limit;
pub mod security;
pub mod sender;
pub mod server;
pub mod status;
pub mod validate;

pub use config::{load_config, Config};
pub use error::{ApiError, GatewayError, Result};

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::io::ReqwestHttpClient;
use crate::rate_limit::RateLimiter;
use crate::security::SecurityLog;
use crate::sender::HttpBridgeSender;
use crate::server::{build_router, AppState};

/// Run the gateway until Ctrl-C
///
/// The API token must already be set; see [`Config::resolve_secrets`].
pub async fn run(config: Config) -> Result<()> {
    if config.server.api_token.is_empty() {
        return Err(GatewayError::Config("No API token configured".to_string()));
    }

    let cancel = CancellationToken::new();

    let http = ReqwestHttpClient::with_timeout(Duration::from_secs(
        config.bridge.request_timeout_seconds,
    ))?;
    let sender = Arc::new(HttpBridgeSender::new(&config.bridge, Arc::new(http)));
    let probe = sender.spawn_probe(
        Duration::from_secs(config.bridge.probe_interval_seconds),
        cancel.clone(),
    );

    let state = AppState::new(
        config.server.api_token.as_str(),
        sender,
        RateLimiter::new(config.server.max_requests_per_minute),
        SecurityLog::new(config.server.security_log.clone()),
    );

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Message gateway listening on http://{} (local access only)", addr);
    match config.server.max_requests_per_minute {
        Some(max) => tracing::info!("Rate limit: {} requests per minute per origin", max),
        None => tracing::info!("Rate limit: accounting only"),
    }

    let cancel_for_server = cancel.clone();
    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancel_for_server.cancelled().await;
    })
    .await?;

    cancel.cancel();
    if let Err(e) = probe.await {
        tracing::warn!("Bridge probe task ended abnormally: {}", e);
    }
    tracing::info!("Message gateway stopped");
    Ok(())
}
