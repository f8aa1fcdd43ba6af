use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source name carried by the sentinel reading returned when every
/// fetcher in a fallback chain has failed.
pub const NO_DATA_SOURCE: &str = "none";

/// Categories of upstream data, each backed by its own fallback chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    Market,
    Technical,
    News,
    Crypto,
}

impl DataCategory {
    pub const ALL: [DataCategory; 4] = [
        DataCategory::Market,
        DataCategory::Technical,
        DataCategory::News,
        DataCategory::Crypto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Market => "market",
            DataCategory::Technical => "technical",
            DataCategory::News => "news",
            DataCategory::Crypto => "crypto",
        }
    }
}

impl std::fmt::Display for DataCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse label for a reading's 0-100 quality score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Medium,
    Low,
    None,
}

/// One source's answer for a (category, symbol) request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSourceReading {
    pub name: String,
    /// 0 to 100, how much this source is trusted.
    pub reliability: f64,
    /// 0 to 100, how complete/usable this particular payload is.
    pub quality: f64,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl DataSourceReading {
    /// Structurally valid reading with zeroed numeric fields.
    pub fn no_data(category: DataCategory, symbol: &str) -> Self {
        Self {
            name: NO_DATA_SOURCE.to_string(),
            reliability: 0.0,
            quality: 0.0,
            latency_ms: 0,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "symbol": symbol,
                "category": category,
                "available": false,
                "price": 0,
                "volume": 0,
            }),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.name == NO_DATA_SOURCE && self.quality == 0.0
    }

    pub fn tier(&self) -> QualityTier {
        if self.is_sentinel() || self.quality <= 0.0 {
            QualityTier::None
        } else if self.quality >= 80.0 {
            QualityTier::High
        } else if self.quality >= 50.0 {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }
}
