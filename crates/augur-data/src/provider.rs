use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use augur_models::config::{DataConfig, VerificationConfig};
use augur_models::health::ApiHealth;
use augur_models::reading::{DataCategory, DataSourceReading, QualityTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheLayer, CacheState};
use crate::health::HealthTracker;
use crate::rate_limit::RateLimitedQueue;
use crate::resolver::{cache_key, SourceFallbackResolver, SourceFetcher, DEFAULT_API_FAMILY};
use crate::verifier::{CrossSourceVerifier, VerificationResult};

/// Everything known about a symbol after one aggregation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComprehensiveData {
    pub symbol: String,
    pub market: DataSourceReading,
    pub technical: DataSourceReading,
    pub news: DataSourceReading,
    pub crypto: DataSourceReading,
    pub verification: VerificationResult,
    pub consistency_score: Option<f64>,
    pub data_quality: DataQualitySummary,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataQualitySummary {
    /// Mean reading quality across the four categories.
    pub average_quality: f64,
    pub categories_available: usize,
    pub missing_categories: Vec<DataCategory>,
    pub market_sources: usize,
}

/// Owns all shared data-layer state: the cache, the health map, one
/// rate limiter per API family and the verifier. Construct once and
/// share by handle.
pub struct DataProvider {
    resolver: SourceFallbackResolver,
    cache: Arc<CacheLayer<DataSourceReading>>,
    health: Arc<HealthTracker>,
    queues: HashMap<String, Arc<RateLimitedQueue>>,
    verifier: CrossSourceVerifier,
}

impl DataProvider {
    pub fn new(config: &DataConfig, verification: VerificationConfig) -> Self {
        let buffer = Duration::from_millis(config.safety_buffer_ms);
        let queues: HashMap<String, Arc<RateLimitedQueue>> = config
            .rate_limits
            .iter()
            .map(|limit| {
                (
                    limit.api.clone(),
                    Arc::new(RateLimitedQueue::from_config(limit, buffer)),
                )
            })
            .collect();
        let default_queue = queues.get(DEFAULT_API_FAMILY).cloned().unwrap_or_else(|| {
            Arc::new(RateLimitedQueue::new(
                DEFAULT_API_FAMILY,
                10,
                Duration::from_millis(1_000),
                buffer,
            ))
        });

        let cache = Arc::new(CacheLayer::new(
            config.cache_max_capacity,
            Duration::from_secs(config.cache_ttl_seconds),
        ));
        let health = Arc::new(HealthTracker::new(
            config.health_success_delta,
            config.health_failure_delta,
        ));

        Self {
            resolver: SourceFallbackResolver::new(
                queues.clone(),
                default_queue,
                Arc::clone(&health),
                Arc::clone(&cache),
            ),
            cache,
            health,
            queues,
            verifier: CrossSourceVerifier::new(verification),
        }
    }

    /// Append a source to the end of a category's fallback chain.
    pub fn register(&mut self, category: DataCategory, fetcher: Arc<dyn SourceFetcher>) {
        self.resolver.register(category, fetcher);
    }

    /// One reading via the category's fallback chain; never fails.
    pub async fn fetch(&self, category: DataCategory, symbol: &str) -> DataSourceReading {
        self.resolver.fetch(category, symbol).await
    }

    /// Read every market source, verify the first answer against the rest
    /// and record the outcome in the symbol's history.
    ///
    /// A fresh cached market reading with a recorded verification is
    /// served without touching the sources. When every source fails, a
    /// cached (possibly stale) reading or the no-data sentinel stands in
    /// and the chain is not retried.
    pub async fn verified_market(&self, symbol: &str) -> (DataSourceReading, VerificationResult) {
        let key = cache_key(DataCategory::Market, symbol);
        let cached = self.cache.get(&key).await;
        if cached.state == CacheState::Fresh {
            if let (Some(reading), Some(latest)) = (&cached.payload, self.verifier.latest(symbol)) {
                debug!(symbol, source = %reading.name, "Market cache hit, reusing verification");
                return (reading.clone(), latest);
            }
        }

        let mut readings = self.resolver.fetch_all(DataCategory::Market, symbol).await;
        let (primary, secondaries) = if readings.is_empty() {
            let fallback = match cached.payload {
                Some(reading) => {
                    warn!(symbol, source = %reading.name, "All market sources failed, serving cached reading");
                    reading
                }
                None => {
                    warn!(symbol, "All market sources failed, returning no-data reading");
                    DataSourceReading::no_data(DataCategory::Market, symbol)
                }
            };
            (fallback, vec![])
        } else {
            let primary = readings.remove(0);
            self.cache.set(&key, primary.clone(), primary.quality).await;
            (primary, readings)
        };

        let verification = self.verifier.verify(symbol, &primary, &secondaries);
        (primary, verification)
    }

    /// Resolve all four categories concurrently and verify market data.
    pub async fn comprehensive(&self, symbol: &str) -> ComprehensiveData {
        let start = Instant::now();
        info!(symbol, "Aggregating comprehensive data");

        let ((market, verification), technical, news, crypto) = tokio::join!(
            self.verified_market(symbol),
            self.fetch(DataCategory::Technical, symbol),
            self.fetch(DataCategory::News, symbol),
            self.fetch(DataCategory::Crypto, symbol),
        );

        let categorized = [
            (DataCategory::Market, &market),
            (DataCategory::Technical, &technical),
            (DataCategory::News, &news),
            (DataCategory::Crypto, &crypto),
        ];
        let missing_categories: Vec<DataCategory> = categorized
            .iter()
            .filter(|(_, r)| r.tier() == QualityTier::None)
            .map(|(c, _)| *c)
            .collect();
        if !missing_categories.is_empty() {
            warn!(symbol, missing = ?missing_categories, "Some categories have no data");
        }

        let data_quality = DataQualitySummary {
            average_quality: (categorized.iter().map(|(_, r)| r.quality).sum::<f64>()
                / categorized.len() as f64)
                .round(),
            categories_available: categorized.len() - missing_categories.len(),
            missing_categories,
            market_sources: verification.sources.len(),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            symbol,
            verified = verification.verified,
            quality = data_quality.average_quality,
            elapsed_ms,
            "Comprehensive data ready"
        );

        ComprehensiveData {
            symbol: symbol.to_string(),
            consistency_score: self.verifier.consistency_score(symbol),
            market,
            technical,
            news,
            crypto,
            verification,
            data_quality,
            elapsed_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn health_snapshot(&self) -> Vec<ApiHealth> {
        self.health.snapshot()
    }

    pub async fn cache_size(&self) -> u64 {
        self.cache.size().await
    }

    pub async fn cache_keys(&self) -> Vec<String> {
        self.cache.keys().await
    }

    pub fn verification_history(&self, symbol: &str) -> Vec<VerificationResult> {
        self.verifier.history(symbol)
    }

    pub fn consistency_score(&self, symbol: &str) -> Option<f64> {
        self.verifier.consistency_score(symbol)
    }

    pub fn queue(&self, api: &str) -> Option<Arc<RateLimitedQueue>> {
        self.queues.get(api).cloned()
    }
}
