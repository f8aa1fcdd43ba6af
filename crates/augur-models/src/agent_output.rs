use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agent's opinion about a symbol, exactly as the agent produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawAgentOutput {
    pub agent: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Agent-specific payload. Shape depends on the agent kind.
    pub data: serde_json::Value,
    /// 0 to 100.
    pub confidence: f64,
    pub sources: Vec<String>,
    pub processing_time_ms: u64,
}

/// Outcome of a single validation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub score: f64,
    pub details: String,
    pub critical: bool,
}

impl ValidationCheck {
    pub fn is_critical_failure(&self) -> bool {
        self.critical && !self.passed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<ValidationCheck>,
    /// Mean of all check scores.
    pub score: f64,
}

impl ValidationResult {
    /// Derive `passed` and `score` from the checks.
    pub fn from_checks(checks: Vec<ValidationCheck>) -> Self {
        let passed = !checks.iter().any(ValidationCheck::is_critical_failure);
        let score = if checks.is_empty() {
            0.0
        } else {
            (checks.iter().map(|c| c.score).sum::<f64>() / checks.len() as f64).round()
        };
        Self {
            passed,
            checks,
            score,
        }
    }

    pub fn check(&self, name: &str) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn critical_failures(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.is_critical_failure())
            .count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityMetrics {
    pub data_freshness: f64,
    pub source_reliability: f64,
    pub cross_verification: f64,
    pub anomaly_score: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub overall_quality: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReliabilityMetrics {
    pub historical_accuracy: f64,
    pub data_source_health: f64,
    pub signal_strength: f64,
}

/// A raw output after validation: confidence is the adjusted value,
/// the agent's own figure is kept in `raw_confidence`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedAgentOutput {
    #[serde(flatten)]
    pub output: RawAgentOutput,
    pub raw_confidence: f64,
    pub quality_metrics: QualityMetrics,
    pub validation: ValidationResult,
    pub reliability: ReliabilityMetrics,
}

impl ValidatedAgentOutput {
    pub fn agent(&self) -> &str {
        &self.output.agent
    }

    pub fn confidence(&self) -> f64 {
        self.output.confidence
    }
}
