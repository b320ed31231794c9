//! Per-origin request accounting in one-minute buckets

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Counts requests per origin per minute and optionally enforces a ceiling
#[derive(Debug, Default)]
pub struct RateLimiter {
    max_per_minute: Option<u32>,
    buckets: Mutex<BTreeMap<u64, HashMap<IpAddr, u32>>>,
}

fn current_minute() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 60)
        .unwrap_or_default()
}

impl RateLimiter {
    pub fn new(max_per_minute: Option<u32>) -> Self {
        Self {
            max_per_minute,
            buckets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Count a request from `origin`; `false` means it should be rejected
    pub fn check(&self, origin: IpAddr) -> bool {
        self.check_at(origin, current_minute())
    }

    pub fn check_at(&self, origin: IpAddr, minute: u64) -> bool {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !buckets.contains_key(&minute) {
            buckets.retain(|bucket, _| *bucket >= minute);
        }
        let count = buckets
            .entry(minute)
            .or_default()
            .entry(origin)
            .or_insert(0);
        *count += 1;

        tracing::debug!("{} request(s) from {} this minute", count, origin);
        self.max_per_minute.is_none_or(|max| *count <= max)
    }

    /// Requests counted for `origin` in `minute`
    pub fn count_at(&self, origin: IpAddr, minute: u64) -> u32 {
        self.buckets
            .lock()
            .map(|buckets| {
                buckets
                    .get(&minute)
                    .and_then(|b| b.get(&origin))
                    .copied()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Number of minute buckets currently held
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }
}
