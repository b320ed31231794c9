//! Message sender trait and the chat bridge implementation

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::error::GatewayError;
use crate::io::HttpClient;

/// Delivers messages to a chat
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, target: &str, text: &str) -> crate::Result<()>;

    async fn send_media(&self, target: &str, path: &Path, caption: &str) -> crate::Result<()>;

    /// Whether the messaging client is connected
    fn is_ready(&self) -> bool;
}

/// Guess a media type from the file extension
pub fn mimetype_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Sender that relays to an HTTP chat bridge
pub struct HttpBridgeSender {
    http: Arc<dyn HttpClient>,
    send_url: String,
    health_url: String,
    token: String,
    ready: AtomicBool,
}

impl HttpBridgeSender {
    pub fn new(config: &BridgeConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            send_url: config.send_url(),
            health_url: config.health_url(),
            token: config.token.clone(),
            ready: AtomicBool::new(false),
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        if self.token.is_empty() {
            return Vec::new();
        }
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        )]
    }

    async fn post(&self, payload: serde_json::Value) -> crate::Result<()> {
        if !self.is_ready() {
            return Err(GatewayError::NotReady);
        }

        let response = self
            .http
            .post_json(&self.send_url, &self.headers(), &payload)
            .await?;

        if !response.is_success() {
            return Err(GatewayError::Sender(format!(
                "Bridge returned status {}: {}",
                response.status, response.body
            )));
        }
        Ok(())
    }

    /// Ask the bridge whether its client is connected and record the answer
    pub async fn probe(&self) -> bool {
        let ready = match self.http.get(&self.health_url, &self.headers()).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                tracing::debug!("Bridge health probe failed: {}", e);
                false
            }
        };

        let was_ready = self.ready.swap(ready, Ordering::Relaxed);
        if ready != was_ready {
            if ready {
                tracing::info!("Messaging client is ready");
            } else {
                tracing::warn!("Messaging client disconnected");
            }
        }
        ready
    }

    /// Probe readiness every `interval` until cancelled
    pub fn spawn_probe(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let sender = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                sender.probe().await;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            tracing::debug!("Bridge health probe stopped");
        })
    }
}

#[async_trait]
impl MessageSender for HttpBridgeSender {
    async fn send_text(&self, target: &str, text: &str) -> crate::Result<()> {
        self.post(serde_json::json!({
            "chatId": target,
            "message": text,
        }))
        .await?;
        tracing::info!("Alert sent to {}", target);
        Ok(())
    }

    async fn send_media(&self, target: &str, path: &Path, caption: &str) -> crate::Result<()> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            GatewayError::Sender(format!("Failed to read image {}: {}", path.display(), e))
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.post(serde_json::json!({
            "chatId": target,
            "caption": caption,
            "media": {
                "mimetype": mimetype_for(path),
                "filename": filename,
                "data": base64::engine::general_purpose::STANDARD.encode(&data),
            },
        }))
        .await?;
        tracing::info!("Checkpoint sent to {}", target);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}
