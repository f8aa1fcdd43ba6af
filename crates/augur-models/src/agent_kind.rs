//! Typed registry of the agent kinds the validator knows about.
//!
//! Each kind carries the metadata the validation rules consult: which
//! top-level payload fields must be present, how old the data may be,
//! and which source domains count as reliable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    MarketData,
    TechnicalAnalysis,
    NewsSentiment,
    SocialSentiment,
    OnchainAnalytics,
    MacroEconomic,
    FundamentalAnalysis,
    PredictionSynthesis,
}

impl AgentKind {
    /// The independent agents, in the positional order the orchestrator expects.
    pub const PHASE_ONE: [AgentKind; 7] = [
        AgentKind::MarketData,
        AgentKind::TechnicalAnalysis,
        AgentKind::NewsSentiment,
        AgentKind::SocialSentiment,
        AgentKind::OnchainAnalytics,
        AgentKind::MacroEconomic,
        AgentKind::FundamentalAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::MarketData => "market_data",
            AgentKind::TechnicalAnalysis => "technical_analysis",
            AgentKind::NewsSentiment => "news_sentiment",
            AgentKind::SocialSentiment => "social_sentiment",
            AgentKind::OnchainAnalytics => "onchain_analytics",
            AgentKind::MacroEconomic => "macro_economic",
            AgentKind::FundamentalAnalysis => "fundamental_analysis",
            AgentKind::PredictionSynthesis => "prediction_synthesis",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "market_data" => Some(AgentKind::MarketData),
            "technical_analysis" => Some(AgentKind::TechnicalAnalysis),
            "news_sentiment" => Some(AgentKind::NewsSentiment),
            "social_sentiment" => Some(AgentKind::SocialSentiment),
            "onchain_analytics" => Some(AgentKind::OnchainAnalytics),
            "macro_economic" => Some(AgentKind::MacroEconomic),
            "fundamental_analysis" => Some(AgentKind::FundamentalAnalysis),
            "prediction_synthesis" => Some(AgentKind::PredictionSynthesis),
            _ => None,
        }
    }

    /// Built-in validation metadata for this kind.
    pub fn default_profile(&self) -> AgentProfile {
        const MINUTE: u64 = 60_000;
        const HOUR: u64 = 60 * MINUTE;

        let (fields, max_age, domains, accuracy): (&[&str], u64, &[&str], f64) = match self {
            AgentKind::MarketData => (
                &["price", "volume", "change_percent"],
                5 * MINUTE,
                &["finance.yahoo.com", "polygon.io", "finnhub.io", "alphavantage.co"],
                80.0,
            ),
            AgentKind::TechnicalAnalysis => (
                &["indicators", "trend", "trend_strength"],
                15 * MINUTE,
                &["alphavantage.co", "twelvedata.com", "polygon.io", "tradingview.com"],
                72.0,
            ),
            AgentKind::NewsSentiment => (
                &["articles", "sentiment", "summary"],
                HOUR,
                &["reuters.com", "bloomberg.com", "newsapi.org", "wsj.com", "cnbc.com"],
                65.0,
            ),
            AgentKind::SocialSentiment => (
                &["sentiment", "mentions", "platforms"],
                30 * MINUTE,
                &["reddit.com", "x.com", "twitter.com", "stocktwits.com"],
                55.0,
            ),
            AgentKind::OnchainAnalytics => (
                &["metrics", "network_activity"],
                HOUR,
                &["glassnode.com", "etherscan.io", "blockchain.com", "coingecko.com"],
                68.0,
            ),
            AgentKind::MacroEconomic => (
                &["indicators", "outlook"],
                6 * HOUR,
                &["fred.stlouisfed.org", "bls.gov", "worldbank.org", "imf.org"],
                62.0,
            ),
            AgentKind::FundamentalAnalysis => (
                &["valuation", "financials"],
                12 * HOUR,
                &["sec.gov", "finnhub.io", "alphavantage.co", "morningstar.com"],
                70.0,
            ),
            AgentKind::PredictionSynthesis => (
                &["direction", "timeframes", "confidence"],
                5 * MINUTE,
                &[
                    "market_data",
                    "technical_analysis",
                    "news_sentiment",
                    "social_sentiment",
                    "onchain_analytics",
                    "macro_economic",
                    "fundamental_analysis",
                ],
                75.0,
            ),
        };

        AgentProfile {
            required_fields: fields.iter().map(|s| s.to_string()).collect(),
            max_data_age_ms: max_age,
            reliable_source_domains: domains.iter().map(|s| s.to_string()).collect(),
            historical_accuracy: accuracy,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation metadata for one agent kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub required_fields: Vec<String>,
    pub max_data_age_ms: u64,
    pub reliable_source_domains: Vec<String>,
    /// Baseline accuracy reported in reliability metrics (0 to 100).
    pub historical_accuracy: f64,
}

impl AgentProfile {
    /// Profile used for agent names outside the registry: nothing required,
    /// one hour max age, no trusted domains.
    pub fn fallback() -> Self {
        Self {
            required_fields: vec![],
            max_data_age_ms: 60 * 60_000,
            reliable_source_domains: vec![],
            historical_accuracy: 50.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in AgentKind::PHASE_ONE {
            assert_eq!(AgentKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(
            AgentKind::from_name("prediction_synthesis"),
            Some(AgentKind::PredictionSynthesis)
        );
        assert_eq!(AgentKind::from_name("astrology"), None);
    }

    #[test]
    fn every_kind_has_required_fields_and_domains() {
        for kind in AgentKind::PHASE_ONE {
            let profile = kind.default_profile();
            assert!(!profile.required_fields.is_empty(), "{kind}");
            assert!(!profile.reliable_source_domains.is_empty(), "{kind}");
            assert!(profile.max_data_age_ms >= 60_000, "{kind}");
        }
    }

    #[test]
    fn fallback_profile_is_permissive() {
        let profile = AgentProfile::fallback();
        assert!(profile.required_fields.is_empty());
        assert_eq!(profile.max_data_age_ms, 3_600_000);
    }
}
