//! Weighted voting across agents and timeframes.
//!
//! Deterministic given its inputs: no clock reads, no I/O. Every threshold
//! and weight comes from [`SynthesisConfig`].

use std::collections::BTreeMap;

use augur_models::config::SynthesisConfig;
use augur_models::signal::{
    AgentTimeframeSignals, Direction, RiskLevel, SynthesizedPrediction, Timeframe, TimeframeSignal,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Everything the engine needs for one prediction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisInput {
    pub agents: Vec<AgentTimeframeSignals>,
    /// Average overall quality of the contributing agents (0 to 100).
    pub overall_quality: f64,
    /// Aggregate validation score (0 to 100).
    pub validation_score: f64,
    /// Reference time for the expiration stamp.
    #[serde(default = "Utc::now")]
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SynthesisEngine {
    config: SynthesisConfig,
}

impl SynthesisEngine {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn synthesize(&self, input: &SynthesisInput) -> SynthesizedPrediction {
        let timeframes: BTreeMap<Timeframe, TimeframeSignal> = Timeframe::ALL
            .iter()
            .map(|tf| (*tf, self.timeframe_signal(&input.agents, *tf)))
            .collect();

        let (direction, confidence) = self.combine(&timeframes);
        let risk_level = self.risk_level(
            (input.overall_quality + confidence + input.validation_score) / 3.0,
        );
        let horizon_hours = self.horizon_hours(&timeframes);

        SynthesizedPrediction {
            direction,
            timeframes,
            confidence,
            risk_level,
            horizon_hours,
            expires_at: input.as_of + Duration::hours(i64::from(horizon_hours)),
        }
    }

    /// Vote one timeframe. Agents without a signal for it abstain; if
    /// nobody votes the timeframe is neutral with zero confidence.
    pub fn timeframe_signal(
        &self,
        agents: &[AgentTimeframeSignals],
        timeframe: Timeframe,
    ) -> TimeframeSignal {
        let votes: Vec<(f64, &TimeframeSignal)> = agents
            .iter()
            .filter_map(|a| a.timeframes.get(&timeframe).map(|s| (a.weight, s)))
            .collect();
        if votes.is_empty() {
            return TimeframeSignal::neutral();
        }

        let total_weight: f64 = votes.iter().map(|(w, _)| w).sum();
        let signed = if total_weight > 0.0 {
            votes
                .iter()
                .map(|(w, s)| s.direction.as_number() * w * (s.confidence / 100.0))
                .sum::<f64>()
                / total_weight
        } else {
            0.0
        };
        let confidence =
            votes.iter().map(|(_, s)| s.confidence).sum::<f64>() / votes.len() as f64;

        TimeframeSignal {
            direction: Direction::from_score(signed, self.config.direction_threshold),
            confidence: confidence.clamp(0.0, 100.0).round(),
        }
    }

    fn combine(&self, timeframes: &BTreeMap<Timeframe, TimeframeSignal>) -> (Direction, f64) {
        let mut total_weight = 0.0;
        let mut signed = 0.0;
        let mut confidence = 0.0;
        for (tf, signal) in timeframes {
            let w = self.config.timeframe_weight(*tf);
            total_weight += w;
            signed += signal.direction.as_number() * w * (signal.confidence / 100.0);
            confidence += signal.confidence * w;
        }
        if total_weight <= 0.0 {
            return (Direction::Sideways, 0.0);
        }
        (
            Direction::from_score(signed / total_weight, self.config.direction_threshold),
            (confidence / total_weight).clamp(0.0, 100.0).round(),
        )
    }

    pub fn risk_level(&self, score: f64) -> RiskLevel {
        if score >= self.config.low_risk_cutoff {
            RiskLevel::Low
        } else if score >= self.config.medium_risk_cutoff {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    /// Monthly conviction wins over weekly.
    pub fn horizon_hours(&self, timeframes: &BTreeMap<Timeframe, TimeframeSignal>) -> u32 {
        let active = |tf: Timeframe| {
            timeframes
                .get(&tf)
                .is_some_and(|s| !s.direction.is_neutral())
        };
        if active(Timeframe::OneMonth) {
            self.config.monthly_horizon_hours
        } else if active(Timeframe::OneWeek) {
            self.config.weekly_horizon_hours
        } else {
            self.config.base_horizon_hours
        }
    }
}
