//! BDD test world for problem-watch

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cucumber::World;
use problem_watch::cache::{KeyStore, NotifiedKeys};
use problem_watch::driver::{DriverLauncher, SessionDriver};
use problem_watch::notifier::Notifier;
use problem_watch::pipeline::RunReport;
use problem_watch::WatchError;
use relay_protocol::ForwardRequest;

pub const LOGIN_URL: &str = "http://dash.local/zabbix/index.php";
pub const LANDING_URL: &str = "http://dash.local/zabbix/zabbix.php?action=dashboard.view";
pub const START_TIME: &str = "10:15:00";

/// How the scripted dashboard reacts to a login attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginScript {
    #[default]
    Accepts,
    RejectsCredentials,
    TimesOut,
    HidesLogoutLink,
}

#[derive(Debug, Default, World)]
pub struct WatchWorld {
    // Duration parsing
    pub parsed_minutes: Option<f64>,

    // Pipeline runs
    pub login: LoginScript,
    pub rows: Vec<Vec<String>>,
    pub cached: Vec<String>,
    pub sent: Arc<Mutex<Vec<ForwardRequest>>>,
    pub saved: Arc<Mutex<Option<NotifiedKeys>>>,
    pub table_reads: Arc<Mutex<usize>>,
    pub outcome: Option<Result<RunReport, String>>,
}

impl WatchWorld {
    pub fn sent_to(&self, chat: &str) -> Vec<ForwardRequest> {
        self.sent
            .lock()
            .map(|sent| {
                sent.iter()
                    .filter(|r| r.group_id == chat)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A dashboard that follows a login script and serves fixed rows
#[derive(Debug)]
pub struct ScriptedDriver {
    pub login: LoginScript,
    pub rows: Vec<Vec<String>>,
    pub current_url: Mutex<String>,
    pub table_reads: Arc<Mutex<usize>>,
}

#[async_trait]
impl SessionDriver for ScriptedDriver {
    async fn new_page(&self) -> problem_watch::Result<()> {
        Ok(())
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> problem_watch::Result<()> {
        if self.login == LoginScript::TimesOut {
            return Err(WatchError::Timeout(format!("navigation to {}", url)));
        }
        if let Ok(mut current) = self.current_url.lock() {
            *current = url.to_string();
        }
        Ok(())
    }

    async fn type_text(&self, _selector: &str, _text: &str) -> problem_watch::Result<()> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> problem_watch::Result<()> {
        Ok(())
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> problem_watch::Result<()> {
        if self.login != LoginScript::RejectsCredentials {
            if let Ok(mut current) = self.current_url.lock() {
                *current = LANDING_URL.to_string();
            }
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        _selector: &str,
        _timeout: Duration,
    ) -> problem_watch::Result<()> {
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> problem_watch::Result<bool> {
        Ok(match selector {
            ".error" => self.login == LoginScript::RejectsCredentials,
            s if s.contains("action=logout") => self.login == LoginScript::Accepts,
            _ => true,
        })
    }

    async fn evaluate(&self, script: &str) -> problem_watch::Result<serde_json::Value> {
        if script.contains("querySelectorAll") {
            if let Ok(mut reads) = self.table_reads.lock() {
                *reads += 1;
            }
            return Ok(serde_json::json!(self.rows));
        }
        Ok(serde_json::json!("Problems"))
    }

    async fn cookies(&self) -> problem_watch::Result<Vec<String>> {
        Ok(vec!["zbx_session".to_string()])
    }

    async fn current_url(&self) -> problem_watch::Result<String> {
        Ok(self
            .current_url
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn close(&self) -> problem_watch::Result<()> {
        Ok(())
    }
}

/// Hands out one scripted driver per launch
#[derive(Debug)]
pub struct ScriptedLauncher {
    pub login: LoginScript,
    pub rows: Vec<Vec<String>>,
    pub table_reads: Arc<Mutex<usize>>,
}

#[async_trait]
impl DriverLauncher for ScriptedLauncher {
    async fn launch(&self) -> problem_watch::Result<Box<dyn SessionDriver>> {
        Ok(Box::new(ScriptedDriver {
            login: self.login,
            rows: self.rows.clone(),
            current_url: Mutex::new(String::new()),
            table_reads: Arc::clone(&self.table_reads),
        }))
    }
}

/// Records every request instead of sending it
#[derive(Debug)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<ForwardRequest>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn type_name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, request: &ForwardRequest) -> problem_watch::Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(request.clone());
        }
        Ok(())
    }
}

/// Key store held in memory
#[derive(Debug)]
pub struct MemoryKeyStore {
    pub initial: Vec<String>,
    pub saved: Arc<Mutex<Option<NotifiedKeys>>>,
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn load(&self) -> problem_watch::Result<NotifiedKeys> {
        Ok(self.initial.iter().cloned().collect())
    }

    async fn save(&self, keys: &NotifiedKeys) -> problem_watch::Result<()> {
        if let Ok(mut saved) = self.saved.lock() {
            *saved = Some(keys.clone());
        }
        Ok(())
    }
}
