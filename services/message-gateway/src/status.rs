//! Status snapshot and timestamps

use std::sync::Mutex;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use relay_protocol::{ConnectionStatus, ServerStats, StatusResponse};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Current UTC time as RFC 3339 with millisecond precision
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a byte count as megabytes
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Process figures for the GET status response
pub struct ProcessStats {
    started: Instant,
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl std::fmt::Debug for ProcessStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessStats")
            .field("started", &self.started)
            .field("pid", &self.pid)
            .finish()
    }
}

impl Default for ProcessStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessStats {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| tracing::warn!("Cannot determine own pid: {}", e))
            .ok();
        Self {
            started: Instant::now(),
            pid,
            system: Mutex::new(System::new()),
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Resident set size of this process in bytes, 0 when unavailable
    pub fn resident_bytes(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let Ok(mut system) = self.system.lock() else {
            return 0;
        };
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }

    pub fn snapshot(&self, sender_ready: bool) -> StatusResponse {
        StatusResponse {
            success: true,
            status: "online".to_string(),
            whatsapp: ConnectionStatus::from(sender_ready),
            timestamp: timestamp(),
            server: ServerStats {
                uptime: self.uptime_seconds(),
                memory_usage: format_megabytes(self.resident_bytes()),
            },
        }
    }
}
