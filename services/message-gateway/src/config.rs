//! Configuration types for the message gateway

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use relay_protocol::DEFAULT_GATEWAY_PORT;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Listener and request policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port on 127.0.0.1; the gateway never binds other interfaces
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub api_token: String,
    /// Requests per origin per minute; unset means count but never reject
    #[serde(default)]
    pub max_requests_per_minute: Option<u32>,
    /// JSON-lines file receiving security events
    #[serde(default)]
    pub security_log: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_token: String::new(),
            max_requests_per_minute: None,
            security_log: None,
        }
    }
}

/// Chat bridge the gateway relays messages to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_url")]
    pub url: String,
    /// Sent as a bearer token when set
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_send_path")]
    pub send_path: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_probe_interval_seconds")]
    pub probe_interval_seconds: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            token: String::new(),
            send_path: default_send_path(),
            health_path: default_health_path(),
            request_timeout_seconds: default_request_timeout_seconds(),
            probe_interval_seconds: default_probe_interval_seconds(),
        }
    }
}

impl BridgeConfig {
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn send_url(&self) -> String {
        self.endpoint(&self.send_path)
    }

    pub fn health_url(&self) -> String {
        self.endpoint(&self.health_path)
    }
}

fn default_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_send_path() -> String {
    "messages".to_string()
}

fn default_health_path() -> String {
    "health".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_probe_interval_seconds() -> u64 {
    15
}

/// Generate a random 32-byte API token, hex encoded
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

impl Config {
    /// Overlay deployment values and secrets from the environment
    ///
    /// Returns `true` when no token was configured and one was generated.
    pub fn resolve_secrets(&mut self) -> crate::Result<bool> {
        self.apply_env(|key| std::env::var(key).ok())?;
        Ok(self.ensure_token())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> crate::Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = get("API_TOKEN") {
            self.server.api_token = token;
        }
        if let Some(port) = get("API_PORT") {
            self.server.port = port.parse().map_err(|e| {
                crate::GatewayError::Config(format!("Invalid API_PORT {:?}: {}", port, e))
            })?;
        }
        if let Some(url) = get("BRIDGE_URL") {
            self.bridge.url = url;
        }
        if let Some(token) = get("BRIDGE_TOKEN") {
            self.bridge.token = token;
        }
        Ok(())
    }

    fn ensure_token(&mut self) -> bool {
        if !self.server.api_token.is_empty() {
            return false;
        }
        self.server.api_token = generate_token();
        true
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::GatewayError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
