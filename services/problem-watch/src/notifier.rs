//! Notifier trait for relaying forward requests

use async_trait::async_trait;
use relay_protocol::ForwardRequest;

/// Trait for sending forward requests to a chat
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "gateway")
    fn type_name(&self) -> &str;

    /// Deliver one request
    async fn notify(&self, request: &ForwardRequest) -> crate::Result<()>;
}
