//! Turns decisions into gateway requests and sends them in the background

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay_protocol::ForwardRequest;
use tokio_util::task::TaskTracker;

use crate::config::{GatewayConfig, MessageConfig};
use crate::delivery::DeliveryPolicy;
use crate::eligibility::EligibleAlert;
use crate::notifier::Notifier;
use crate::session::{LoginFailure, LoginFailureKind};

/// Something to tell a chat
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// One alert, sent to the alert chat
    Individual(EligibleAlert),
    /// Too many new alerts at once, sent to the control chat
    Massive { count: usize },
    /// Free text for operators, sent to the control chat
    Operator(String),
}

/// Fill an alert template
pub fn render_alert(template: &str, alert: &EligibleAlert, signature: &str) -> String {
    let record = &alert.record;
    template
        .replace("{host}", &record.host)
        .replace("{problem}", &record.problem)
        .replace("{severity}", &record.severity)
        .replace("{start_time}", &record.start_time)
        .replace("{duration}", &record.duration)
        .replace("{count}", &alert.count.to_string())
        .replace("{signature}", signature)
}

/// Operator text for a session failure
pub fn login_failure_text(failure: &LoginFailure, messages: &MessageConfig) -> String {
    let template = match failure.kind {
        LoginFailureKind::TimeoutOrNavigation => &messages.timeout_notice,
        LoginFailureKind::Credentials => &messages.credentials_notice,
        LoginFailureKind::Unknown => &messages.unknown_login_notice,
    };
    template
        .replace("{error}", &failure.detail)
        .replace("{signature}", &messages.signature)
}

/// Delivery counts for one run
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub enqueued: AtomicUsize,
    pub delivered: AtomicUsize,
    pub failed: AtomicUsize,
}

/// Sends notices without blocking the caller
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    policy: Arc<dyn DeliveryPolicy>,
    messages: MessageConfig,
    alert_chat_id: String,
    control_chat_id: String,
    tracker: TaskTracker,
    stats: Arc<DispatchStats>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("notifier", &self.notifier.type_name())
            .field("policy", &self.policy.name())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        policy: Arc<dyn DeliveryPolicy>,
        gateway: &GatewayConfig,
        messages: &MessageConfig,
    ) -> Self {
        Self {
            notifier,
            policy,
            messages: messages.clone(),
            alert_chat_id: gateway.alert_chat_id.clone(),
            control_chat_id: gateway.control_chat_id.clone(),
            tracker: TaskTracker::new(),
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Map a notice to the request the gateway receives; always text-only
    pub fn build(&self, notice: &Notice) -> ForwardRequest {
        match notice {
            Notice::Individual(alert) => ForwardRequest::alert(
                &self.alert_chat_id,
                render_alert(
                    &self.messages.individual_template,
                    alert,
                    &self.messages.signature,
                ),
            ),
            Notice::Massive { count } => ForwardRequest::alert(
                &self.control_chat_id,
                self.messages
                    .massive_template
                    .replace("{count}", &count.to_string())
                    .replace("{signature}", &self.messages.signature),
            ),
            Notice::Operator(text) => ForwardRequest::alert(&self.control_chat_id, text),
        }
    }

    /// Spawn delivery of a notice and return immediately
    pub async fn enqueue(&self, notice: Notice) {
        let request = self.build(&notice);
        let key = match &notice {
            Notice::Individual(alert) => Some(alert.key.clone()),
            _ => None,
        };

        let notifier = Arc::clone(&self.notifier);
        let policy = Arc::clone(&self.policy);
        let stats = Arc::clone(&self.stats);
        let task_key = key.clone();

        stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.tracker.spawn(async move {
            match notifier.notify(&request).await {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::info!("Notice delivered to {}", request.group_id);
                    if let Some(key) = &task_key {
                        policy.on_delivered(key).await;
                    }
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Failed to deliver notice to {}: {}", request.group_id, e);
                    if let Some(key) = &task_key {
                        policy.on_failed(key).await;
                    }
                }
            }
        });

        if let Some(key) = &key {
            self.policy.on_enqueued(key).await;
        }
    }

    /// Wait for in-flight deliveries; returns false if the timeout elapsed first
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::debug!("Waiting for {} in-flight notices", pending);
        }
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    "{} notices still in flight after {:?}",
                    self.tracker.len(),
                    timeout
                );
                false
            }
        }
    }
}
