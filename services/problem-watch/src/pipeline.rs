//! One poll of the dashboard, from login to persisting the notified keys

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{new_key_store_handle, KeyStore, NotifiedKeys};
use crate::config::Config;
use crate::delivery::build_policy;
use crate::dispatcher::{login_failure_text, Dispatcher, Notice};
use crate::driver::{DriverLauncher, SessionDriver};
use crate::eligibility::{evaluate, Decision};
use crate::error::WatchError;
use crate::extractor::extract;
use crate::notifier::Notifier;
use crate::session::{LoginFailure, SessionManager};

/// What a completed run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub new_eligible: usize,
    pub has_duplicates: bool,
    /// Individual alert notices enqueued
    pub individual: usize,
    /// Count carried by the massive notice, if one was sent
    pub massive: Option<usize>,
    pub delivered: usize,
    pub failed: usize,
    /// All deliveries finished before the drain timeout
    pub drained: bool,
    pub persisted: bool,
}

/// The polling pipeline and its collaborators
pub struct Pipeline {
    config: Config,
    launcher: Arc<dyn DriverLauncher>,
    store: Arc<dyn KeyStore>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("notifier", &self.notifier.type_name())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        config: Config,
        launcher: Arc<dyn DriverLauncher>,
        store: Arc<dyn KeyStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            launcher,
            store,
            notifier,
        }
    }

    fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.config.gateway.drain_timeout_seconds)
    }

    /// Run one poll
    ///
    /// A session failure sends one operator notice and aborts the run with
    /// [`WatchError::Session`]; nothing is persisted in that case.
    pub async fn run_once(&self) -> crate::Result<RunReport> {
        let keys = new_key_store_handle(NotifiedKeys::new());
        let policy = build_policy(self.config.gateway.delivery_policy, keys.clone());
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.notifier),
            policy,
            &self.config.gateway,
            &self.config.messages,
        );

        let records = match self.scrape().await {
            Ok(records) => records,
            Err(failure) => {
                dispatcher
                    .enqueue(Notice::Operator(login_failure_text(
                        &failure,
                        &self.config.messages,
                    )))
                    .await;
                dispatcher.drain(self.drain_timeout()).await;
                return Err(WatchError::Session(failure));
            }
        };

        let loaded = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("Could not read notified-key cache, starting empty: {}", e);
                NotifiedKeys::new()
            }
        };
        let evaluation = {
            let mut guard = keys.write().await;
            *guard = loaded;
            evaluate(records, &guard, &self.config.eligibility)
        };

        let mut report = RunReport {
            total: evaluation.total,
            new_eligible: evaluation.new_eligible,
            has_duplicates: evaluation.has_duplicates,
            ..RunReport::default()
        };

        if evaluation.has_duplicates {
            dispatcher
                .enqueue(Notice::Operator(self.config.messages.duplicate_notice.clone()))
                .await;
        }

        match evaluation.decision {
            Decision::Massive { count } => {
                tracing::warn!("{} new alerts at once, sending massive notice", count);
                dispatcher.enqueue(Notice::Massive { count }).await;
                report.massive = Some(count);
            }
            Decision::Individual(alerts) => {
                report.individual = alerts.len();
                for alert in alerts {
                    dispatcher.enqueue(Notice::Individual(alert)).await;
                }
            }
        }

        report.drained = dispatcher.drain(self.drain_timeout()).await;
        report.delivered = dispatcher.stats().delivered.load(Ordering::Relaxed);
        report.failed = dispatcher.stats().failed.load(Ordering::Relaxed);

        let snapshot = keys.read().await.clone();
        match self.store.save(&snapshot).await {
            Ok(()) => report.persisted = true,
            Err(e) => tracing::error!("Failed to save notified-key cache: {}", e),
        }

        tracing::info!(
            "Run complete: {} alerts, {} new eligible, {} individual, massive {:?}, {} delivered, {} failed",
            report.total,
            report.new_eligible,
            report.individual,
            report.massive,
            report.delivered,
            report.failed
        );
        Ok(report)
    }

    /// Log in, read the problem list and release the browser
    async fn scrape(&self) -> Result<Vec<crate::alert::AlertRecord>, LoginFailure> {
        let driver = self
            .launcher
            .launch()
            .await
            .map_err(|e| LoginFailure::from_error(&e))?;

        let result = self.scrape_with(driver.as_ref()).await;

        if let Err(e) = driver.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        result
    }

    async fn scrape_with(
        &self,
        driver: &dyn SessionDriver,
    ) -> Result<Vec<crate::alert::AlertRecord>, LoginFailure> {
        driver
            .new_page()
            .await
            .map_err(|e| LoginFailure::from_error(&e))?;

        let dashboard = &self.config.dashboard;
        let mut session = SessionManager::new(dashboard).establish(driver).await?;

        extract(&mut session, &dashboard.problems_url(), &self.config.extraction)
            .await
            .map_err(|e| {
                let failure = LoginFailure::from_error(&e);
                tracing::error!("Extraction aborted: {}", failure);
                failure
            })
    }
}
