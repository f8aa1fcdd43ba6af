use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use augur_models::config::RateLimitConfig;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window admission control for one external API family.
///
/// At most `max_requests` calls are admitted in any window of `window`.
/// Waiting callers queue on a fair (FIFO) async mutex; whoever holds it is
/// the only drain loop for this queue and sleeps for the exact time until
/// the oldest admission leaves the window. The admission log sits behind
/// its own short-lived lock so it can be read while the drain sleeps.
pub struct RateLimitedQueue {
    name: String,
    max_requests: usize,
    window: Duration,
    safety_buffer: Duration,
    drain: tokio::sync::Mutex<()>,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RateLimitedQueue {
    pub fn new(name: &str, max_requests: usize, window: Duration, safety_buffer: Duration) -> Self {
        Self {
            name: name.to_string(),
            max_requests: max_requests.max(1),
            window,
            safety_buffer,
            drain: tokio::sync::Mutex::new(()),
            admissions: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn from_config(config: &RateLimitConfig, safety_buffer: Duration) -> Self {
        Self::new(
            &config.api,
            config.max_requests,
            Duration::from_millis(config.window_ms),
            safety_buffer,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for admission, then run `request`. Its output, including any
    /// error, is returned to the caller untouched.
    pub async fn submit<F, Fut, T>(&self, request: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.admit().await;
        request().await
    }

    async fn admit(&self) {
        let _drain = self.drain.lock().await;
        loop {
            let wait = {
                let now = Instant::now();
                let mut admissions = self.lock_admissions();
                self.prune(&mut admissions, now);
                if admissions.len() < self.max_requests {
                    admissions.push_back(now);
                    return;
                }
                // Full window: the front entry is the next to expire.
                let Some(oldest) = admissions.front().copied() else {
                    continue;
                };
                (oldest + self.window).saturating_duration_since(now) + self.safety_buffer
            };
            debug!(
                queue = %self.name,
                wait_ms = wait.as_millis() as u64,
                in_window = self.max_requests,
                "Rate limit reached, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of admissions still inside the current window. Never waits
    /// on a caller that is sleeping for admission.
    pub fn admitted_in_window(&self) -> usize {
        let mut admissions = self.lock_admissions();
        self.prune(&mut admissions, Instant::now());
        admissions.len()
    }

    fn prune(&self, admissions: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = admissions.front() {
            if now.duration_since(*oldest) >= self.window {
                admissions.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock_admissions(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        self.admissions.lock().unwrap_or_else(|e| e.into_inner())
    }
}
