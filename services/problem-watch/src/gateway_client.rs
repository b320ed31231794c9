//! Client for the local message gateway

use std::sync::Arc;

use async_trait::async_trait;
use relay_protocol::{ForwardRequest, ForwardResponse, API_TOKEN_HEADER};

use crate::config::GatewayConfig;
use crate::io::HttpClient;
use crate::notifier::Notifier;

/// Sends forward requests to the message gateway over HTTP
pub struct GatewayNotifier {
    url: String,
    api_token: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for GatewayNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayNotifier")
            .field("url", &self.url)
            .finish()
    }
}

impl GatewayNotifier {
    pub fn new(config: &GatewayConfig, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created GatewayNotifier for {}", config.url);

        Self {
            url: config.url.clone(),
            api_token: config.api_token.clone(),
            http,
        }
    }
}

#[async_trait]
impl Notifier for GatewayNotifier {
    fn type_name(&self) -> &str {
        "gateway"
    }

    async fn notify(&self, request: &ForwardRequest) -> crate::Result<()> {
        let body = serde_json::to_value(request)?;
        tracing::debug!(
            "Forwarding {} to {} ({} chars)",
            request.kind,
            request.group_id,
            request.message.chars().count()
        );

        let response = self
            .http
            .post_json(
                &self.url,
                &[(API_TOKEN_HEADER, self.api_token.as_str())],
                &body,
            )
            .await?;

        // only a readable `success: true` counts as delivered
        let parsed: Option<ForwardResponse> = serde_json::from_str(&response.body).ok();
        let accepted = parsed.as_ref().is_some_and(|r| r.success);

        if !response.is_success() || !accepted {
            let reason = parsed
                .and_then(|r| r.error)
                .unwrap_or_else(|| response.body.clone());
            return Err(crate::WatchError::Notifier(format!(
                "Gateway returned status {}: {}",
                response.status, reason
            )));
        }

        tracing::debug!("Gateway accepted message for {}", request.group_id);
        Ok(())
    }
}
