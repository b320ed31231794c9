//! When dispatched alerts enter the notified-key cache

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::KeyStoreHandle;
use crate::config::DeliveryPolicyKind;

/// Two-phase hook around an individual alert dispatch
#[async_trait]
pub trait DeliveryPolicy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// The dispatch for `key` has been handed to the dispatcher
    async fn on_enqueued(&self, key: &str);

    /// The gateway accepted the notice for `key`
    async fn on_delivered(&self, key: &str);

    /// The notice for `key` could not be delivered
    async fn on_failed(&self, key: &str);
}

/// Caches the key as soon as its dispatch is enqueued
#[derive(Debug)]
pub struct MarkOnEnqueue {
    keys: KeyStoreHandle,
}

impl MarkOnEnqueue {
    pub fn new(keys: KeyStoreHandle) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl DeliveryPolicy for MarkOnEnqueue {
    fn name(&self) -> &str {
        "mark_on_enqueue"
    }

    async fn on_enqueued(&self, key: &str) {
        self.keys.write().await.insert(key);
    }

    async fn on_delivered(&self, _key: &str) {}

    async fn on_failed(&self, key: &str) {
        tracing::warn!("Delivery failed for {}; key stays cached", key);
    }
}

/// Caches the key only once delivery is confirmed
#[derive(Debug)]
pub struct MarkOnConfirm {
    keys: KeyStoreHandle,
}

impl MarkOnConfirm {
    pub fn new(keys: KeyStoreHandle) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl DeliveryPolicy for MarkOnConfirm {
    fn name(&self) -> &str {
        "mark_on_confirm"
    }

    async fn on_enqueued(&self, _key: &str) {}

    async fn on_delivered(&self, key: &str) {
        self.keys.write().await.insert(key);
    }

    async fn on_failed(&self, key: &str) {
        tracing::warn!("Delivery failed for {}; will retry next run", key);
    }
}

/// Build the configured policy over the shared key set
pub fn build_policy(kind: DeliveryPolicyKind, keys: KeyStoreHandle) -> Arc<dyn DeliveryPolicy> {
    match kind {
        DeliveryPolicyKind::MarkOnEnqueue => Arc::new(MarkOnEnqueue::new(keys)),
        DeliveryPolicyKind::MarkOnConfirm => Arc::new(MarkOnConfirm::new(keys)),
    }
}
