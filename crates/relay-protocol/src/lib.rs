//! Relay protocol
//!
//! JSON wire types exchanged between the problem watcher and the local
//! message gateway. The field names (`groupId`, `tipo`, `imagePath`,
//! `whatsapp`, `memoryUsage`) are part of the protocol and must not change.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Header carrying the shared API token
pub const API_TOKEN_HEADER: &str = "X-API-Token";

/// Largest request body the gateway accepts (1 MiB)
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Port the gateway listens on when nothing else is configured
pub const DEFAULT_GATEWAY_PORT: u16 = 3241;

/// Kind of forward request, encoded on the wire as the integer `tipo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SendKind {
    /// Checkpoint: an image sent as media with the message as caption
    Checkpoint,
    /// Alert: text only
    Alert,
}

impl SendKind {
    pub fn code(self) -> u8 {
        match self {
            SendKind::Checkpoint => 1,
            SendKind::Alert => 2,
        }
    }
}

impl From<SendKind> for u8 {
    fn from(kind: SendKind) -> Self {
        kind.code()
    }
}

impl TryFrom<u8> for SendKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SendKind::Checkpoint),
            2 => Ok(SendKind::Alert),
            other => Err(ProtocolError::InvalidKind(other.to_string())),
        }
    }
}

impl fmt::Display for SendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendKind::Checkpoint => write!(f, "checkpoint"),
            SendKind::Alert => write!(f, "alert"),
        }
    }
}

/// Errors raised when decoding protocol values
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid tipo {0}: must be 1 (checkpoint) or 2 (alert)")]
    InvalidKind(String),
}

/// A request asking the gateway to forward a message to a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub group_id: String,
    pub message: String,
    #[serde(rename = "tipo")]
    pub kind: SendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
}

impl ForwardRequest {
    /// Build a text-only alert request
    pub fn alert(group_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            message: message.into(),
            kind: SendKind::Alert,
            image_path: None,
        }
    }

    /// Build a checkpoint request carrying an image
    pub fn checkpoint(
        group_id: impl Into<String>,
        caption: impl Into<String>,
        image_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            message: caption.into(),
            kind: SendKind::Checkpoint,
            image_path: Some(image_path.into()),
        }
    }
}

/// Body returned by the gateway for POST requests and for every failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ForwardResponse {
    pub fn sent(message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            timestamp: Some(timestamp.into()),
        }
    }

    pub fn failure(error: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            timestamp,
        }
    }
}

/// Connectivity of the messaging client as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl From<bool> for ConnectionStatus {
    fn from(ready: bool) -> Self {
        if ready {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

/// Process figures included in the status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    /// Seconds since the gateway started
    pub uptime: f64,
    /// Resident memory, formatted as `"<n> MB"`
    pub memory_usage: String,
}

/// Body returned by the gateway for an authenticated GET
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: String,
    pub whatsapp: ConnectionStatus,
    pub timestamp: String,
    pub server: ServerStats,
}
