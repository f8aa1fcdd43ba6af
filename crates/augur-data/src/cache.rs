use std::time::{Duration, Instant};

use moka::future::Cache;
use serde::Serialize;

/// Freshness of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Younger than the TTL.
    Fresh,
    /// Between one and two TTLs old. Still returned, flagged for the caller.
    Stale,
    /// Absent, or at least two TTLs old.
    Miss,
}

impl CacheState {
    pub fn classify(age: Duration, ttl: Duration) -> Self {
        if age < ttl {
            CacheState::Fresh
        } else if age < ttl * 2 {
            CacheState::Stale
        } else {
            CacheState::Miss
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub payload: V,
    pub stored_at: Instant,
    pub quality: f64,
}

#[derive(Debug, Clone)]
pub struct CacheLookup<V> {
    pub payload: Option<V>,
    pub state: CacheState,
    pub quality: f64,
}

impl<V> CacheLookup<V> {
    fn miss() -> Self {
        Self {
            payload: None,
            state: CacheState::Miss,
            quality: 0.0,
        }
    }
}

/// TTL cache with a stale grace period, backed by moka.
///
/// moka evicts entries once they reach twice the TTL; freshness is
/// decided on read from the entry's own timestamp, so a lookup never
/// returns an entry past that bound even if moka has not swept it yet.
pub struct CacheLayer<V> {
    inner: Cache<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V> CacheLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl * 2)
                .build(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> CacheLookup<V> {
        let Some(entry) = self.inner.get(key).await else {
            return CacheLookup::miss();
        };

        match CacheState::classify(entry.stored_at.elapsed(), self.ttl) {
            CacheState::Miss => {
                self.inner.invalidate(key).await;
                CacheLookup::miss()
            }
            state => CacheLookup {
                payload: Some(entry.payload),
                state,
                quality: entry.quality,
            },
        }
    }

    /// Store or overwrite `key`, resetting its age.
    pub async fn set(&self, key: &str, payload: V, quality: f64) {
        let entry = CacheEntry {
            payload,
            stored_at: Instant::now(),
            quality,
        };
        self.inner.insert(key.to_string(), entry).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// Number of entries currently held, after flushing moka's pending maintenance.
    pub async fn size(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.run_pending_tasks().await;
        let mut keys: Vec<String> = self.inner.iter().map(|(k, _)| k.as_ref().clone()).collect();
        keys.sort();
        keys
    }
}
