use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent_output::{QualityMetrics, ReliabilityMetrics, ValidatedAgentOutput};
use crate::signal::SynthesizedPrediction;

/// Complete result of one two-phase run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationResult {
    pub run_id: Uuid,
    pub symbol: String,
    pub predictions: SynthesizedPrediction,
    /// Phase-1 outputs in positional order, then the synthesis output.
    pub per_agent_results: Vec<ValidatedAgentOutput>,
    pub metadata: RunMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    /// Per-field average across all agents. `warnings` is left empty; run
    /// warnings live in [`RunMetadata::warnings`].
    pub overall_quality: QualityMetrics,
    pub validation_summary: ValidationSummary,
    pub reliability_metrics: ReliabilityMetrics,
    pub transparency_report: Vec<SourceContribution>,
    /// Weighted sum of adjusted agent confidences.
    pub overall_confidence: f64,
    pub low_quality_agents: Vec<String>,
    /// Phase-1 agents dropped under the partial-results policy.
    pub failed_agents: Vec<String>,
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationSummary {
    pub total_checks: usize,
    pub passed_checks: usize,
    pub critical_failures: usize,
    /// 100 x passed / total, rounded.
    pub overall_score: f64,
}

impl ValidationSummary {
    pub fn from_outputs(outputs: &[ValidatedAgentOutput]) -> Self {
        let checks = outputs.iter().flat_map(|o| o.validation.checks.iter());
        let mut summary = ValidationSummary::default();
        for check in checks {
            summary.total_checks += 1;
            if check.passed {
                summary.passed_checks += 1;
            }
            if check.is_critical_failure() {
                summary.critical_failures += 1;
            }
        }
        if summary.total_checks > 0 {
            summary.overall_score =
                (100.0 * summary.passed_checks as f64 / summary.total_checks as f64).round();
        }
        summary
    }
}

/// One cited source and how much it contributed to the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceContribution {
    pub source: String,
    /// Highest data-source health among the agents citing it.
    pub reliability: f64,
    /// Sum of the citing agents' signal strength.
    pub contribution: f64,
    pub cited_by: Vec<String>,
}
