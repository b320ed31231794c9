//! Alert records extracted from the problem table

use serde::{Deserialize, Serialize};

/// One row of the problem table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub host: String,
    pub problem: String,
    pub severity: String,
    pub start_time: String,
    /// Raw duration text as shown on the dashboard
    pub duration: String,
}

impl AlertRecord {
    /// Key identifying the same problem occurrence across polls
    pub fn identity_key(&self) -> String {
        format!("{}|{}|{}", self.host, self.problem, self.start_time)
    }
}
