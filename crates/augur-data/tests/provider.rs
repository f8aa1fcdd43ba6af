//! End-to-end aggregation through `DataProvider` with scripted sources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use augur_data::{DataError, DataProvider, SourceFetcher};
use augur_models::config::{DataConfig, VerificationConfig};
use augur_models::reading::{DataCategory, DataSourceReading};
use chrono::Utc;

struct StaticSource {
    name: String,
    family: String,
    payload: Option<serde_json::Value>,
    reliability: f64,
    calls: AtomicUsize,
}

impl StaticSource {
    fn ok(name: &str, reliability: f64, payload: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            family: "general".to_string(),
            payload: Some(payload),
            reliability,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            family: "general".to_string(),
            payload: None,
            reliability: 0.0,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceFetcher for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn api_family(&self) -> &str {
        &self.family
    }

    async fn fetch(&self, _symbol: &str) -> Result<Option<DataSourceReading>, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.payload {
            Some(payload) => Ok(Some(DataSourceReading {
                name: self.name.clone(),
                reliability: self.reliability,
                quality: 80.0,
                latency_ms: 0,
                timestamp: Utc::now(),
                payload: payload.clone(),
            })),
            None => Err(DataError::fetch(&self.name, "connection refused")),
        }
    }
}

fn provider() -> DataProvider {
    DataProvider::new(&DataConfig::default(), VerificationConfig::default())
}

#[tokio::test]
async fn comprehensive_verifies_market_and_degrades_other_categories() {
    let mut provider = provider();
    provider.register(
        DataCategory::Market,
        StaticSource::ok(
            "yahoo",
            90.0,
            serde_json::json!({"price": 150.0, "volume": 1_000_000.0}),
        ),
    );
    provider.register(DataCategory::Market, StaticSource::failing("polygon"));
    provider.register(
        DataCategory::Market,
        StaticSource::ok(
            "finnhub",
            80.0,
            serde_json::json!({"price": 151.0, "volume": 1_050_000.0}),
        ),
    );
    provider.register(
        DataCategory::Technical,
        StaticSource::ok("twelvedata", 75.0, serde_json::json!({"rsi": 55.0})),
    );
    provider.register(DataCategory::News, StaticSource::failing("newsapi"));

    let data = provider.comprehensive("AAPL").await;

    assert_eq!(data.market.name, "yahoo");
    assert_eq!(data.verification.sources, vec!["yahoo", "finnhub"]);
    assert!(data.verification.conflicts.is_empty());
    assert!(data.verification.verified);
    assert_eq!(data.consistency_score, Some(1.0));

    assert_eq!(data.technical.name, "twelvedata");
    assert!(data.news.is_sentinel());
    assert!(data.crypto.is_sentinel());
    assert_eq!(
        data.data_quality.missing_categories,
        vec![DataCategory::News, DataCategory::Crypto]
    );
    assert_eq!(data.data_quality.categories_available, 2);
    assert_eq!(data.data_quality.average_quality, 40.0);

    let health = provider.health_snapshot();
    let polygon = health.iter().find(|h| h.name == "polygon").unwrap();
    assert_eq!(polygon.success_rate, 90.0);
    let newsapi = health.iter().find(|h| h.name == "newsapi").unwrap();
    assert_eq!(newsapi.calls, 1);

    let keys = provider.cache_keys().await;
    assert!(keys.contains(&"market:AAPL".to_string()));
    assert!(keys.contains(&"technical:AAPL".to_string()));
    assert!(!keys.contains(&"news:AAPL".to_string()));
}

#[tokio::test]
async fn cached_category_is_not_refetched() {
    let mut provider = provider();
    let source = StaticSource::ok("coingecko", 85.0, serde_json::json!({"price": 64_000.0}));
    provider.register(DataCategory::Crypto, source.clone());

    let first = provider.fetch(DataCategory::Crypto, "BTC").await;
    let second = provider.fetch(DataCategory::Crypto, "BTC").await;

    assert_eq!(first.name, "coingecko");
    assert_eq!(second.payload, first.payload);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.cache_size().await, 1);
}

#[tokio::test]
async fn conflicting_market_sources_lower_consistency() {
    let mut provider = provider();
    provider.register(
        DataCategory::Market,
        StaticSource::ok("yahoo", 90.0, serde_json::json!({"price": 100.0, "volume": 1e6})),
    );
    provider.register(
        DataCategory::Market,
        StaticSource::ok("polygon", 90.0, serde_json::json!({"price": 100.0, "volume": 1e6})),
    );
    provider.register(
        DataCategory::Market,
        StaticSource::ok("shady", 40.0, serde_json::json!({"price": 130.0, "volume": 1e6})),
    );

    let (_, verification) = provider.verified_market("AAPL").await;
    assert_eq!(verification.conflicts.len(), 1);
    assert!(!verification.verified);
    assert_eq!(verification.consensus["price"], 100.0);

    assert_eq!(provider.verification_history("AAPL").len(), 1);
    assert_eq!(provider.consistency_score("AAPL"), Some(0.0));
}

#[tokio::test]
async fn no_market_sources_yields_sentinel_verification() {
    let provider = provider();
    let (market, verification) = provider.verified_market("XYZ").await;
    assert!(market.is_sentinel());
    assert!(verification.verified);
    assert_eq!(verification.verification_score, 0.0);
    assert!(provider.queue("general").is_some());
    assert!(provider.queue("analytics").is_some());
}

#[tokio::test]
async fn failing_market_source_is_called_once_per_pass() {
    let mut provider = provider();
    let polygon = StaticSource::failing("polygon");
    provider.register(DataCategory::Market, polygon.clone());

    let (market, verification) = provider.verified_market("AAPL").await;
    assert!(market.is_sentinel());
    assert_eq!(verification.sources, vec![augur_models::NO_DATA_SOURCE]);

    assert_eq!(polygon.calls.load(Ordering::SeqCst), 1);
    let health = provider.health_snapshot();
    let polygon_health = health.iter().find(|h| h.name == "polygon").unwrap();
    assert_eq!(polygon_health.calls, 1);
    assert_eq!(polygon_health.success_rate, 90.0);
}

#[tokio::test]
async fn fresh_market_reading_reuses_last_verification() {
    let mut provider = provider();
    let yahoo = StaticSource::ok("yahoo", 90.0, serde_json::json!({"price": 150.0, "volume": 1e6}));
    let finnhub = StaticSource::ok("finnhub", 80.0, serde_json::json!({"price": 150.5, "volume": 1e6}));
    provider.register(DataCategory::Market, yahoo.clone());
    provider.register(DataCategory::Market, finnhub.clone());

    let (first, first_verification) = provider.verified_market("AAPL").await;
    let (second, second_verification) = provider.verified_market("AAPL").await;

    assert_eq!(second, first);
    assert_eq!(second_verification, first_verification);
    assert_eq!(yahoo.calls.load(Ordering::SeqCst), 1);
    assert_eq!(finnhub.calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.verification_history("AAPL").len(), 1);
}
