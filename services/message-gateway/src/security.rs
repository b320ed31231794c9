//! Origin checks, security event logging and response hardening

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tower_http::set_header::SetResponseHeaderLayer;

/// Whether a peer address is the local host
///
/// Only `127.0.0.1`, `::1` and the IPv4-mapped `::ffff:127.0.0.1` qualify.
pub fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4 == Ipv4Addr::LOCALHOST,
        IpAddr::V6(v6) => {
            v6 == Ipv6Addr::LOCALHOST || v6.to_ipv4_mapped() == Some(Ipv4Addr::LOCALHOST)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    RemoteAccessBlocked,
    RateLimited,
    MethodNotAllowed,
    InvalidToken,
    InvalidStatusToken,
    PayloadTooLarge,
    ProcessingError,
}

/// One line of the security log
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: SecurityEventKind,
    pub ip: String,
    pub details: String,
}

/// Records security events to tracing and, optionally, a JSON-lines file
#[derive(Debug, Default)]
pub struct SecurityLog {
    path: Option<PathBuf>,
    // serializes appends so lines never interleave
    write_lock: tokio::sync::Mutex<()>,
}

impl SecurityLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn record(&self, kind: SecurityEventKind, ip: Option<IpAddr>, details: &str) {
        let event = SecurityEvent {
            timestamp: crate::status::timestamp(),
            kind,
            ip: ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string()),
            details: details.to_string(),
        };

        tracing::warn!(
            target: "security",
            kind = ?event.kind,
            ip = %event.ip,
            "{}",
            event.details
        );

        if let Some(path) = &self.path {
            if let Err(e) = self.append(path, &event).await {
                tracing::error!("Failed to write security log {:?}: {}", path, e);
            }
        }
    }

    async fn append(&self, path: &Path, event: &SecurityEvent) -> crate::Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn hardening_headers() -> [(HeaderName, &'static str); 5] {
    [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_XSS_PROTECTION, "1; mode=block"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::CONTENT_SECURITY_POLICY, "default-src 'none'"),
        (header::SERVER, "Message Gateway"),
    ]
}

/// Add the hardening headers to every response of `router`
///
/// Must be applied after the routes and fallback are registered.
pub fn harden<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    hardening_headers()
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ))
        })
}
