//! Error types for the problem watcher

use crate::session::LoginFailure;

/// Errors that can occur while watching the dashboard
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session driver error: {0}")]
    Driver(String),

    #[error("Timeout waiting for {0}")]
    Timeout(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Login rejected: {0}")]
    CredentialsRejected(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("{0}")]
    Session(LoginFailure),

    #[error("Notifier error: {0}")]
    Notifier(String),
}

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
