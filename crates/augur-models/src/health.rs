use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling health record for one named upstream source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiHealth {
    pub name: String,
    /// 0 to 100. Starts at 100, moves additively on each attempt.
    pub success_rate: f64,
    pub calls: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl ApiHealth {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            success_rate: 100.0,
            calls: 0,
            last_success: None,
            last_failure: None,
        }
    }

    pub fn record_success(&mut self, delta: f64) {
        self.calls += 1;
        self.success_rate = (self.success_rate + delta).clamp(0.0, 100.0);
        self.last_success = Some(Utc::now());
    }

    pub fn record_failure(&mut self, delta: f64) {
        self.calls += 1;
        self.success_rate = (self.success_rate - delta).clamp(0.0, 100.0);
        self.last_failure = Some(Utc::now());
    }
}
