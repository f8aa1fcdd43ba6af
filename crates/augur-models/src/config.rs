use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent_kind::{AgentKind, AgentProfile};
use crate::signal::Timeframe;

/// Top-level configuration for Augur.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AugurConfig {
    pub data: DataConfig,
    pub verification: VerificationConfig,
    pub validation: ValidationConfig,
    pub orchestrator: OrchestratorConfig,
    pub synthesis: SynthesisConfig,
}

/// Admission limit for one external API family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    pub api: String,
    pub max_requests: usize,
    pub window_ms: u64,
}

/// Configuration for the data-provider layer (cache, health, queues).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Entries younger than this are fresh; up to twice this they are stale.
    pub cache_ttl_seconds: u64,
    /// Upper bound on cached payloads held in memory.
    pub cache_max_capacity: u64,
    pub health_success_delta: f64,
    pub health_failure_delta: f64,
    /// Added to every computed queue wait.
    pub safety_buffer_ms: u64,
    pub rate_limits: Vec<RateLimitConfig>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            cache_max_capacity: 10_000,
            health_success_delta: 5.0,
            health_failure_delta: 10.0,
            safety_buffer_ms: 10,
            rate_limits: vec![
                RateLimitConfig {
                    api: "general".to_string(),
                    max_requests: 10,
                    window_ms: 1_000,
                },
                RateLimitConfig {
                    api: "analytics".to_string(),
                    max_requests: 8,
                    window_ms: 60_000,
                },
            ],
        }
    }
}

/// Policy constants for cross-source verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerificationConfig {
    /// Percent deviation from the mean price that counts as a conflict.
    pub price_deviation_pct: f64,
    pub volume_deviation_pct: f64,
    pub conflict_penalty_score: f64,
    pub conflict_penalty_confidence: f64,
    pub multi_source_bonus: f64,
    /// Number of recent results the consistency score looks at.
    pub history_window: usize,
    /// A conflict-free result still needs this confidence to count as verified.
    pub min_verified_confidence: f64,
    /// Bucket width (percent of mean) when grouping sources for majority consensus.
    pub price_bucket_pct: f64,
    pub volume_bucket_pct: f64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            price_deviation_pct: 5.0,
            volume_deviation_pct: 20.0,
            conflict_penalty_score: 10.0,
            conflict_penalty_confidence: 15.0,
            multi_source_bonus: 10.0,
            history_window: 10,
            min_verified_confidence: 50.0,
            price_bucket_pct: 1.0,
            volume_bucket_pct: 10.0,
        }
    }
}

/// Weight of each sub-score in `overall_quality`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityWeights {
    pub freshness: f64,
    pub source_reliability: f64,
    pub cross_verification: f64,
    pub anomaly: f64,
    pub completeness: f64,
    pub consistency: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            freshness: 0.20,
            source_reliability: 0.25,
            cross_verification: 0.15,
            anomaly: 0.15,
            completeness: 0.15,
            consistency: 0.10,
        }
    }
}

impl QualityWeights {
    pub fn total(&self) -> f64 {
        self.freshness
            + self.source_reliability
            + self.cross_verification
            + self.anomaly
            + self.completeness
            + self.consistency
    }
}

/// Policy constants for the signal validation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub low_quality_threshold: f64,
    pub low_quality_multiplier: f64,
    pub critical_failure_multiplier: f64,
    pub quality_weights: QualityWeights,
    pub cross_verification_multi_source: f64,
    pub cross_verification_single_source: f64,
    /// Confidence above which an output must cite at least one source.
    pub integrity_high_confidence: f64,
    /// Confidence below which many sources suggests conflicting data.
    pub integrity_low_confidence: f64,
    pub integrity_many_sources: usize,
    pub integrity_conflict_score: f64,
    pub reliable_source_ratio: f64,
    pub anomaly_confidence: f64,
    pub anomaly_trend_strength: f64,
    pub anomaly_sentiment: f64,
    pub anomaly_penalty: f64,
    pub consistency_penalty: f64,
    /// Per-agent overrides, keyed by agent name.
    pub profiles: BTreeMap<String, AgentProfile>,
    pub default_profile: AgentProfile,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            low_quality_threshold: 70.0,
            low_quality_multiplier: 0.8,
            critical_failure_multiplier: 0.5,
            quality_weights: QualityWeights::default(),
            cross_verification_multi_source: 75.0,
            cross_verification_single_source: 50.0,
            integrity_high_confidence: 80.0,
            integrity_low_confidence: 30.0,
            integrity_many_sources: 3,
            integrity_conflict_score: 70.0,
            reliable_source_ratio: 0.5,
            anomaly_confidence: 95.0,
            anomaly_trend_strength: 90.0,
            anomaly_sentiment: 0.9,
            anomaly_penalty: 15.0,
            consistency_penalty: 20.0,
            profiles: BTreeMap::new(),
            default_profile: AgentProfile::fallback(),
        }
    }
}

impl ValidationConfig {
    /// Resolve metadata for an agent: configured override, then the
    /// built-in registry, then the default profile.
    pub fn profile_for(&self, agent: &str) -> AgentProfile {
        if let Some(profile) = self.profiles.get(agent) {
            return profile.clone();
        }
        AgentKind::from_name(agent)
            .map(|kind| kind.default_profile())
            .unwrap_or_else(|| self.default_profile.clone())
    }
}

/// What the orchestrator does when a Phase-1 agent fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure aborts the run.
    #[default]
    FailFast,
    /// Failed agents are dropped and the run continues with the rest.
    PartialResults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub failure_policy: FailurePolicy,
    pub phase_one_agents: usize,
    pub agent_weights: BTreeMap<String, f64>,
    pub default_agent_weight: f64,
    pub low_quality_cutoff: f64,
    pub max_low_quality_agents: usize,
    /// Advisory unless `enforce_timeouts` is set.
    pub agent_timeout_seconds: u64,
    pub enforce_timeouts: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let agent_weights = [
            (AgentKind::MarketData, 0.15),
            (AgentKind::TechnicalAnalysis, 0.20),
            (AgentKind::NewsSentiment, 0.12),
            (AgentKind::SocialSentiment, 0.08),
            (AgentKind::OnchainAnalytics, 0.10),
            (AgentKind::MacroEconomic, 0.10),
            (AgentKind::FundamentalAnalysis, 0.15),
            (AgentKind::PredictionSynthesis, 0.10),
        ]
        .into_iter()
        .map(|(kind, weight)| (kind.as_str().to_string(), weight))
        .collect();

        Self {
            failure_policy: FailurePolicy::FailFast,
            phase_one_agents: AgentKind::PHASE_ONE.len(),
            agent_weights,
            default_agent_weight: 0.05,
            low_quality_cutoff: 60.0,
            max_low_quality_agents: 3,
            agent_timeout_seconds: 30,
            enforce_timeouts: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn weight_for(&self, agent: &str) -> f64 {
        self.agent_weights
            .get(agent)
            .copied()
            .unwrap_or(self.default_agent_weight)
    }
}

/// Policy constants for the weighted-voting synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub timeframe_weights: BTreeMap<Timeframe, f64>,
    /// Signed scores inside +/- this band map to SIDEWAYS.
    pub direction_threshold: f64,
    pub low_risk_cutoff: f64,
    pub medium_risk_cutoff: f64,
    pub base_horizon_hours: u32,
    pub weekly_horizon_hours: u32,
    pub monthly_horizon_hours: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            timeframe_weights: [
                (Timeframe::OneDay, 0.40),
                (Timeframe::OneWeek, 0.35),
                (Timeframe::OneMonth, 0.25),
            ]
            .into_iter()
            .collect(),
            direction_threshold: 0.1,
            low_risk_cutoff: 80.0,
            medium_risk_cutoff: 60.0,
            base_horizon_hours: 24,
            weekly_horizon_hours: 168,
            monthly_horizon_hours: 720,
        }
    }
}

impl SynthesisConfig {
    pub fn timeframe_weight(&self, timeframe: Timeframe) -> f64 {
        self.timeframe_weights
            .get(&timeframe)
            .copied()
            .unwrap_or(0.0)
    }
}
