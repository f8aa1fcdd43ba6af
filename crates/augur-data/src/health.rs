use std::collections::HashMap;
use std::sync::Mutex;

use augur_models::health::ApiHealth;
use tracing::debug;

/// Process-wide health map, one record per source name.
///
/// Guarded by a `Mutex` since every fetch attempt from every task updates it.
pub struct HealthTracker {
    records: Mutex<HashMap<String, ApiHealth>>,
    success_delta: f64,
    failure_delta: f64,
}

impl HealthTracker {
    pub fn new(success_delta: f64, failure_delta: f64) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            success_delta,
            failure_delta,
        }
    }

    pub fn record_success(&self, source: &str) {
        self.update(source, |h, delta, _| h.record_success(delta));
    }

    pub fn record_failure(&self, source: &str) {
        self.update(source, |h, _, delta| h.record_failure(delta));
    }

    fn update(&self, source: &str, apply: impl FnOnce(&mut ApiHealth, f64, f64)) {
        // A poisoned lock only means another task panicked mid-update;
        // the counters are still usable.
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let health = records
            .entry(source.to_string())
            .or_insert_with(|| ApiHealth::new(source));
        apply(health, self.success_delta, self.failure_delta);
        debug!(source, success_rate = health.success_rate, calls = health.calls, "Source health updated");
    }

    pub fn get(&self, source: &str) -> Option<ApiHealth> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(source).cloned()
    }

    /// Copy of every record, sorted by source name.
    pub fn snapshot(&self) -> Vec<ApiHealth> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<ApiHealth> = records.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_each_source_independently() {
        let tracker = HealthTracker::new(5.0, 10.0);
        tracker.record_failure("polygon");
        tracker.record_failure("polygon");
        tracker.record_success("yahoo");

        let polygon = tracker.get("polygon").unwrap();
        assert_eq!(polygon.success_rate, 80.0);
        assert_eq!(polygon.calls, 2);

        let yahoo = tracker.get("yahoo").unwrap();
        assert_eq!(yahoo.success_rate, 100.0);
        assert!(tracker.get("finnhub").is_none());
    }

    #[test]
    fn snapshot_is_sorted() {
        let tracker = HealthTracker::new(5.0, 10.0);
        tracker.record_success("zeta");
        tracker.record_success("alpha");
        let names: Vec<String> = tracker.snapshot().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
