//! Configuration types for the problem watcher

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub messages: MessageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
}

/// Dashboard location, credentials and login page layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Problem list URL; `{base}` expands to the login URL without `index.php`
    #[serde(default = "default_problems_url_template")]
    pub problems_url_template: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub selectors: LoginSelectors,
    /// URL fragments that mean the browser is still on the login entry point
    #[serde(default = "default_login_url_markers")]
    pub login_url_markers: Vec<String>,
    /// Page text that means the session is not authenticated
    #[serde(default = "default_unauthenticated_markers")]
    pub unauthenticated_markers: Vec<String>,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_login_form_timeout_ms")]
    pub login_form_timeout_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            problems_url_template: default_problems_url_template(),
            username: String::new(),
            password: String::new(),
            selectors: LoginSelectors::default(),
            login_url_markers: default_login_url_markers(),
            unauthenticated_markers: default_unauthenticated_markers(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            login_form_timeout_ms: default_login_form_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl DashboardConfig {
    /// Base URL of the dashboard, derived from the login URL
    pub fn base_url(&self) -> &str {
        self.login_url
            .strip_suffix("index.php")
            .unwrap_or(&self.login_url)
    }

    /// Fully expanded problem list URL
    pub fn problems_url(&self) -> String {
        self.problems_url_template.replace("{base}", self.base_url())
    }
}

/// CSS selectors used on the login page and for liveness checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSelectors {
    #[serde(default = "default_username_field")]
    pub username_field: String,
    #[serde(default = "default_password_field")]
    pub password_field: String,
    #[serde(default = "default_submit")]
    pub submit: String,
    #[serde(default = "default_error_indicator")]
    pub error_indicator: String,
    #[serde(default = "default_logout_link")]
    pub logout_link: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            username_field: default_username_field(),
            password_field: default_password_field(),
            submit: default_submit(),
            error_indicator: default_error_indicator(),
            logout_link: default_logout_link(),
        }
    }
}

/// How the problem table is located and mapped to alert records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Selectors tried in order while waiting for the table to render
    #[serde(default = "default_table_selectors")]
    pub table_selectors: Vec<String>,
    #[serde(default = "default_row_selector")]
    pub row_selector: String,
    #[serde(default = "default_cell_selector")]
    pub cell_selector: String,
    #[serde(default = "default_table_timeout_ms")]
    pub table_timeout_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Rows with fewer cells are summary or malformed rows
    #[serde(default = "default_min_cells")]
    pub min_cells: usize,
    #[serde(default)]
    pub columns: ColumnMapping,
    /// Tried in order; the first one that yields a value wins
    #[serde(default = "default_duration_strategies")]
    pub duration_strategies: Vec<DurationStrategy>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            table_selectors: default_table_selectors(),
            row_selector: default_row_selector(),
            cell_selector: default_cell_selector(),
            table_timeout_ms: default_table_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            min_cells: default_min_cells(),
            columns: ColumnMapping::default(),
            duration_strategies: default_duration_strategies(),
        }
    }
}

/// Fixed column positions in a problem row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub start_time: usize,
    pub severity: usize,
    pub host: usize,
    pub problem: usize,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            start_time: 0,
            severity: 2,
            host: 4,
            problem: 5,
        }
    }
}

/// A way of locating the duration cell in a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DurationStrategy {
    /// First cell whose whole text is a duration such as `4m 39s`
    ScanGrammar,
    /// A fixed column position
    Column { index: usize },
}

/// Thresholds deciding which alerts are forwarded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityConfig {
    /// Exclusive lower bound in minutes
    #[serde(default = "default_min_duration")]
    pub min_duration_minutes: f64,
    /// Inclusive upper bound in minutes
    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: f64,
    #[serde(default = "default_informational_severity")]
    pub informational_severity: String,
    /// More new alerts than this in one poll triggers a massive notice
    #[serde(default = "default_massive_threshold")]
    pub massive_threshold: usize,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: default_min_duration(),
            max_duration_minutes: default_max_duration(),
            informational_severity: default_informational_severity(),
            massive_threshold: default_massive_threshold(),
        }
    }
}

/// When a dispatched alert's key enters the notified cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicyKind {
    /// Cache on enqueue, regardless of the delivery outcome
    #[default]
    MarkOnEnqueue,
    /// Cache only once the gateway confirmed delivery
    MarkOnConfirm,
}

/// Where and how notices are sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default)]
    pub api_token: String,
    /// Chat receiving individual alerts
    #[serde(default)]
    pub alert_chat_id: String,
    /// Chat receiving massive, duplicate and login failure notices
    #[serde(default)]
    pub control_chat_id: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Upper bound on waiting for in-flight dispatches at the end of a run
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
    #[serde(default)]
    pub delivery_policy: DeliveryPolicyKind,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            api_token: String::new(),
            alert_chat_id: String::new(),
            control_chat_id: String::new(),
            request_timeout_seconds: default_request_timeout(),
            drain_timeout_seconds: default_drain_timeout(),
            delivery_policy: DeliveryPolicyKind::default(),
        }
    }
}

/// Message templates
///
/// Placeholders: `{host}`, `{problem}`, `{severity}`, `{start_time}`,
/// `{duration}`, `{count}`, `{error}` and `{signature}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    #[serde(default = "default_signature")]
    pub signature: String,
    #[serde(default = "default_individual_template")]
    pub individual_template: String,
    #[serde(default = "default_massive_template")]
    pub massive_template: String,
    #[serde(default = "default_duplicate_notice")]
    pub duplicate_notice: String,
    #[serde(default = "default_timeout_notice")]
    pub timeout_notice: String,
    #[serde(default = "default_credentials_notice")]
    pub credentials_notice: String,
    #[serde(default = "default_unknown_login_notice")]
    pub unknown_login_notice: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            signature: default_signature(),
            individual_template: default_individual_template(),
            massive_template: default_massive_template(),
            duplicate_notice: default_duplicate_notice(),
            timeout_notice: default_timeout_notice(),
            credentials_notice: default_credentials_notice(),
            unknown_login_notice: default_unknown_login_notice(),
        }
    }
}

/// Notified-key cache location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

/// Headless browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Chrome binary; searched in well-known locations when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            args: default_browser_args(),
        }
    }
}

fn default_login_url() -> String {
    "http://localhost/zabbix/index.php".to_string()
}

fn default_problems_url_template() -> String {
    "{base}zabbix.php?action=problem.view&show=3&acknowledgement_status=0&sort=clock&sortorder=DESC&show_timeline=1&compact_view=0&details=0".to_string()
}

fn default_username_field() -> String {
    "#name".to_string()
}

fn default_password_field() -> String {
    "#password".to_string()
}

fn default_submit() -> String {
    "#enter".to_string()
}

fn default_error_indicator() -> String {
    ".error".to_string()
}

fn default_logout_link() -> String {
    r#"a[href*="action=logout"]"#.to_string()
}

fn default_login_url_markers() -> Vec<String> {
    vec!["login".to_string(), "index.php".to_string()]
}

fn default_unauthenticated_markers() -> Vec<String> {
    vec![
        "You are not logged in".to_string(),
        "Você não está autenticado".to_string(),
    ]
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_login_form_timeout_ms() -> u64 {
    60_000
}

fn default_settle_delay_ms() -> u64 {
    3_000
}

fn default_table_selectors() -> Vec<String> {
    vec![".list-table".to_string(), "table".to_string()]
}

fn default_row_selector() -> String {
    ".list-table tbody tr".to_string()
}

fn default_cell_selector() -> String {
    "td".to_string()
}

fn default_table_timeout_ms() -> u64 {
    10_000
}

fn default_min_cells() -> usize {
    7
}

fn default_duration_strategies() -> Vec<DurationStrategy> {
    vec![
        DurationStrategy::ScanGrammar,
        DurationStrategy::Column { index: 6 },
    ]
}

fn default_min_duration() -> f64 {
    2.0
}

fn default_max_duration() -> f64 {
    7.0
}

fn default_informational_severity() -> String {
    "Information".to_string()
}

fn default_massive_threshold() -> usize {
    10
}

fn default_gateway_url() -> String {
    format!("http://127.0.0.1:{}/", relay_protocol::DEFAULT_GATEWAY_PORT)
}

fn default_request_timeout() -> u64 {
    10
}

fn default_drain_timeout() -> u64 {
    10
}

fn default_signature() -> String {
    "Operations Team".to_string()
}

fn default_individual_template() -> String {
    "We are notifying the following event:\n\n*Host:* {host}\n*Problem:* {problem}\n*Severity:* {severity}\n\n{signature}".to_string()
}

fn default_massive_template() -> String {
    "⚠️ {count} new alerts were detected at once. Individual delivery cancelled. Check immediately! ⚠️\n\n{signature}".to_string()
}

fn default_duplicate_notice() -> String {
    "⚠ Duplicate alerts detected; sending each one once.".to_string()
}

fn default_timeout_notice() -> String {
    "⚠ Connection failure: timeout or navigation problem. Check the VPN and the network."
        .to_string()
}

fn default_credentials_notice() -> String {
    "⚠ Login error: invalid dashboard username or password. Please review the credentials."
        .to_string()
}

fn default_unknown_login_notice() -> String {
    "⚠ Unknown error while logging in to the dashboard: {error}".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("cache.json")
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_browser_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--no-first-run",
        "--no-zygote",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// Overlay deployment values and secrets from the environment
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        self.apply_env(|key| std::env::var(key).ok());
        self.validate()
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                tracing::debug!("Using {} from environment", key);
                *target = value;
            }
        };

        set(&mut self.dashboard.login_url, "DASHBOARD_URL");
        set(&mut self.dashboard.username, "DASHBOARD_USERNAME");
        set(&mut self.dashboard.password, "DASHBOARD_PASSWORD");
        set(&mut self.gateway.alert_chat_id, "ALERT_CHAT_ID");
        set(&mut self.gateway.control_chat_id, "CONTROL_CHAT_ID");
        set(&mut self.gateway.api_token, "API_TOKEN");

        if let Some(port) = lookup("API_PORT").filter(|v| !v.is_empty()) {
            self.gateway.url = format!("http://127.0.0.1:{}/", port);
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let missing: Vec<&str> = [
            ("dashboard.username", self.dashboard.username.is_empty()),
            ("dashboard.password", self.dashboard.password.is_empty()),
            ("gateway.api_token", self.gateway.api_token.is_empty()),
            ("gateway.alert_chat_id", self.gateway.alert_chat_id.is_empty()),
            (
                "gateway.control_chat_id",
                self.gateway.control_chat_id.is_empty(),
            ),
        ]
        .into_iter()
        .filter(|(_, empty)| *empty)
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(crate::WatchError::Config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.eligibility.min_duration_minutes >= self.eligibility.max_duration_minutes {
            return Err(crate::WatchError::Config(format!(
                "min_duration_minutes ({}) must be below max_duration_minutes ({})",
                self.eligibility.min_duration_minutes, self.eligibility.max_duration_minutes
            )));
        }

        if self.extraction.duration_strategies.is_empty() {
            return Err(crate::WatchError::Config(
                "At least one duration strategy is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::WatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
