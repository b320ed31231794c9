//! BDD test world for message-gateway

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::Router;
use cucumber::World;
use message_gateway::rate_limit::RateLimiter;
use message_gateway::security::SecurityLog;
use message_gateway::sender::MessageSender;
use message_gateway::server::{build_router, AppState};
use message_gateway::GatewayError;

/// A message that reached the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        target: String,
        text: String,
    },
    Media {
        target: String,
        path: PathBuf,
        caption: String,
    },
}

#[derive(Debug, Default, World)]
pub struct GatewayWorld {
    pub token: String,
    pub ready: bool,
    pub sender_error: Option<String>,
    pub max_per_minute: Option<u32>,
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub images: Option<tempfile::TempDir>,
    pub router: Option<Router>,

    pub statuses: Vec<u16>,
    pub headers: Option<HeaderMap>,
    pub body: Option<serde_json::Value>,
}

impl GatewayWorld {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// The gateway under test, built on first use from the configured givens
    pub fn router(&mut self) -> Router {
        if self.router.is_none() {
            let sender = RecordingSender {
                ready: self.ready,
                error: self.sender_error.clone(),
                sent: Arc::clone(&self.sent),
            };
            let state = AppState::new(
                self.token.as_str(),
                Arc::new(sender),
                RateLimiter::new(self.max_per_minute),
                SecurityLog::new(None),
            );
            self.router = Some(build_router(state));
        }
        self.router.clone().expect("router built above")
    }

    pub fn image_dir(&mut self) -> &Path {
        self.images
            .get_or_insert_with(|| tempfile::tempdir().expect("temp dir"))
            .path()
    }
}

/// Sender that records messages instead of delivering them
#[derive(Debug)]
pub struct RecordingSender {
    pub ready: bool,
    pub error: Option<String>,
    pub sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingSender {
    fn record(&self, message: Sent) -> message_gateway::Result<()> {
        if let Some(error) = &self.error {
            return Err(GatewayError::Sender(error.clone()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, target: &str, text: &str) -> message_gateway::Result<()> {
        self.record(Sent::Text {
            target: target.to_string(),
            text: text.to_string(),
        })
    }

    async fn send_media(
        &self,
        target: &str,
        path: &Path,
        caption: &str,
    ) -> message_gateway::Result<()> {
        self.record(Sent::Media {
            target: target.to_string(),
            path: path.to_path_buf(),
            caption: caption.to_string(),
        })
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
