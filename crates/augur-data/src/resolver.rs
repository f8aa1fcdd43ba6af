use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use augur_models::reading::{DataCategory, DataSourceReading};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::cache::{CacheLayer, CacheState};
use crate::error::DataError;
use crate::health::HealthTracker;
use crate::rate_limit::RateLimitedQueue;

/// Queue used by fetchers whose family has no dedicated limiter.
pub const DEFAULT_API_FAMILY: &str = "general";

/// One named upstream source for a data category. Mockable for testing.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Rate-limit family this source's calls count against.
    fn api_family(&self) -> &str {
        DEFAULT_API_FAMILY
    }

    /// `Ok(None)` means the source answered but had nothing for the symbol.
    async fn fetch(&self, symbol: &str) -> Result<Option<DataSourceReading>, DataError>;
}

pub fn cache_key(category: DataCategory, symbol: &str) -> String {
    format!("{category}:{symbol}")
}

/// Ordered fallback chains per data category, fronted by the cache and
/// throttled by the per-family rate limiters.
pub struct SourceFallbackResolver {
    chains: HashMap<DataCategory, Vec<Arc<dyn SourceFetcher>>>,
    queues: HashMap<String, Arc<RateLimitedQueue>>,
    default_queue: Arc<RateLimitedQueue>,
    health: Arc<HealthTracker>,
    cache: Arc<CacheLayer<DataSourceReading>>,
}

impl SourceFallbackResolver {
    pub fn new(
        queues: HashMap<String, Arc<RateLimitedQueue>>,
        default_queue: Arc<RateLimitedQueue>,
        health: Arc<HealthTracker>,
        cache: Arc<CacheLayer<DataSourceReading>>,
    ) -> Self {
        Self {
            chains: HashMap::new(),
            queues,
            default_queue,
            health,
            cache,
        }
    }

    /// Append a fetcher to the end of a category's chain.
    pub fn register(&mut self, category: DataCategory, fetcher: Arc<dyn SourceFetcher>) {
        self.chains.entry(category).or_default().push(fetcher);
    }

    pub fn chain(&self, category: DataCategory) -> &[Arc<dyn SourceFetcher>] {
        self.chains
            .get(&category)
            .map(|c| c.as_slice())
            .unwrap_or_default()
    }

    fn queue_for(&self, fetcher: &dyn SourceFetcher) -> Arc<RateLimitedQueue> {
        self.queues
            .get(fetcher.api_family())
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_queue))
    }

    /// Resolve one reading for (category, symbol).
    ///
    /// Fresh cache entries are returned as-is. Otherwise the chain is tried
    /// in order and the first reading wins. If the whole chain fails, a
    /// stale cache entry is preferred over the no-data sentinel.
    pub async fn fetch(&self, category: DataCategory, symbol: &str) -> DataSourceReading {
        let key = cache_key(category, symbol);
        let cached = self.cache.get(&key).await;

        let stale = match (cached.state, cached.payload) {
            (CacheState::Fresh, Some(reading)) => {
                debug!(%category, symbol, source = %reading.name, "Cache hit");
                return reading;
            }
            (CacheState::Stale, Some(reading)) => Some(reading),
            _ => None,
        };

        for fetcher in self.chain(category) {
            let queue = self.queue_for(fetcher.as_ref());
            if let Some(reading) = attempt(fetcher.as_ref(), &queue, &self.health, symbol).await {
                self.cache.set(&key, reading.clone(), reading.quality).await;
                return reading;
            }
        }

        if let Some(reading) = stale {
            warn!(%category, symbol, source = %reading.name, "All sources failed, serving stale cache entry");
            return reading;
        }

        warn!(%category, symbol, "All sources failed, returning no-data reading");
        DataSourceReading::no_data(category, symbol)
    }

    /// Ask every source in the category concurrently and return all the
    /// readings that came back, in chain order.
    pub async fn fetch_all(&self, category: DataCategory, symbol: &str) -> Vec<DataSourceReading> {
        let mut tasks = JoinSet::new();
        for (position, fetcher) in self.chain(category).iter().enumerate() {
            let fetcher = Arc::clone(fetcher);
            let queue = self.queue_for(fetcher.as_ref());
            let health = Arc::clone(&self.health);
            let symbol = symbol.to_string();
            tasks.spawn(async move {
                let reading = attempt(fetcher.as_ref(), &queue, &health, &symbol).await;
                (position, reading)
            });
        }

        let mut readings = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, Some(reading))) => readings.push((position, reading)),
                Ok((_, None)) => {}
                Err(e) => error!(%category, symbol, error = %e, "Source task panicked"),
            }
        }
        readings.sort_by_key(|(position, _)| *position);
        readings.into_iter().map(|(_, reading)| reading).collect()
    }
}

/// One rate-limited call to one source, with the outcome recorded in the
/// health map. Errors never escape.
async fn attempt(
    fetcher: &dyn SourceFetcher,
    queue: &RateLimitedQueue,
    health: &HealthTracker,
    symbol: &str,
) -> Option<DataSourceReading> {
    let start = Instant::now();
    let result = queue
        .submit(|| fetcher.fetch(symbol))
        .await
        .and_then(|reading| match reading {
            Some(reading) => check_shape(fetcher.name(), reading).map(Some),
            None => Ok(None),
        });
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Some(mut reading)) => {
            health.record_success(fetcher.name());
            if reading.latency_ms == 0 {
                reading.latency_ms = elapsed_ms;
            }
            debug!(source = fetcher.name(), symbol, elapsed_ms, "Source succeeded");
            Some(reading)
        }
        Ok(None) => {
            health.record_failure(fetcher.name());
            warn!(source = fetcher.name(), symbol, "Source returned no data");
            None
        }
        Err(e) => {
            health.record_failure(fetcher.name());
            warn!(source = fetcher.name(), symbol, error = %e, elapsed_ms, "Source failed");
            None
        }
    }
}

/// Readings must carry an object payload and finite scores to be compared
/// or cached.
fn check_shape(source_name: &str, reading: DataSourceReading) -> Result<DataSourceReading, DataError> {
    if !reading.payload.is_object() {
        return Err(DataError::malformed(source_name, "payload is not a JSON object"));
    }
    if !reading.reliability.is_finite() || !reading.quality.is_finite() {
        return Err(DataError::malformed(source_name, "non-finite reliability or quality"));
    }
    Ok(reading)
}
