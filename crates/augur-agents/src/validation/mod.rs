//! Rule-based validation of raw agent outputs.
//!
//! Every output runs through the same ordered rule set. Check scores feed
//! the quality metrics, which in turn discount the agent's self-reported
//! confidence.

pub mod rules;

use augur_models::agent_output::{
    QualityMetrics, RawAgentOutput, ReliabilityMetrics, ValidatedAgentOutput, ValidationCheck,
    ValidationResult,
};
use augur_models::config::ValidationConfig;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

pub use rules::{default_rules, RuleContext, RuleOutcome, ValidationRule};
use rules::{
    ANOMALY_DETECTION, DATA_COMPLETENESS, DATA_CONSISTENCY, DATA_FRESHNESS, SOURCE_RELIABILITY,
};

pub struct ValidationEngine {
    config: ValidationConfig,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_rules(config, default_rules())
    }

    pub fn with_rules(config: ValidationConfig, rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, output: &RawAgentOutput) -> ValidatedAgentOutput {
        self.validate_at(output, Utc::now())
    }

    /// Validate against an explicit clock. The raw output is left untouched.
    pub fn validate_at(&self, output: &RawAgentOutput, now: DateTime<Utc>) -> ValidatedAgentOutput {
        let profile = self.config.profile_for(&output.agent);
        let ctx = RuleContext {
            output,
            profile: &profile,
            config: &self.config,
            now,
        };

        let checks: Vec<ValidationCheck> = self
            .rules
            .iter()
            .map(|rule| match rule.evaluate(&ctx) {
                Ok(outcome) => ValidationCheck {
                    name: rule.name().to_string(),
                    passed: outcome.passed,
                    score: outcome.score,
                    details: outcome.details,
                    critical: rule.critical(),
                },
                Err(e) => {
                    warn!(agent = %output.agent, rule = rule.name(), error = %e, "Validation rule errored");
                    ValidationCheck {
                        name: rule.name().to_string(),
                        passed: false,
                        score: 0.0,
                        details: e.to_string(),
                        critical: rule.critical(),
                    }
                }
            })
            .collect();

        let validation = ValidationResult::from_checks(checks);
        let quality = self.quality_metrics(&validation, output);
        let confidence = self.adjust_confidence(
            output.confidence,
            quality.overall_quality,
            validation.critical_failures() > 0,
        );

        let reliability = ReliabilityMetrics {
            historical_accuracy: profile.historical_accuracy,
            data_source_health: score_of(&validation, SOURCE_RELIABILITY),
            signal_strength: (confidence * validation.score / 100.0).round(),
        };

        debug!(
            agent = %output.agent,
            raw_confidence = output.confidence,
            confidence,
            quality = quality.overall_quality,
            passed = validation.passed,
            "Validated agent output"
        );

        ValidatedAgentOutput {
            output: RawAgentOutput {
                confidence,
                ..output.clone()
            },
            raw_confidence: output.confidence,
            quality_metrics: quality,
            validation,
            reliability,
        }
    }

    fn quality_metrics(&self, validation: &ValidationResult, output: &RawAgentOutput) -> QualityMetrics {
        let w = &self.config.quality_weights;
        let cross_verification = if output.sources.len() > 1 {
            self.config.cross_verification_multi_source
        } else {
            self.config.cross_verification_single_source
        };

        let mut metrics = QualityMetrics {
            data_freshness: score_of(validation, DATA_FRESHNESS),
            source_reliability: score_of(validation, SOURCE_RELIABILITY),
            cross_verification,
            anomaly_score: score_of(validation, ANOMALY_DETECTION),
            completeness: score_of(validation, DATA_COMPLETENESS),
            consistency: score_of(validation, DATA_CONSISTENCY),
            overall_quality: 0.0,
            warnings: validation
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| format!("{}: {}", c.name, c.details))
                .collect(),
        };

        metrics.overall_quality = (w.freshness * metrics.data_freshness
            + w.source_reliability * metrics.source_reliability
            + w.cross_verification * metrics.cross_verification
            + w.anomaly * metrics.anomaly_score
            + w.completeness * metrics.completeness
            + w.consistency * metrics.consistency)
            .round();

        if metrics.overall_quality < self.config.low_quality_threshold {
            metrics.warnings.push(format!(
                "Overall quality {} below {}",
                metrics.overall_quality, self.config.low_quality_threshold
            ));
        }
        metrics
    }

    fn adjust_confidence(&self, raw: f64, overall_quality: f64, critical_failure: bool) -> f64 {
        let mut confidence = raw;
        if overall_quality < self.config.low_quality_threshold {
            confidence *= self.config.low_quality_multiplier;
        }
        if critical_failure {
            confidence *= self.config.critical_failure_multiplier;
        }
        confidence.min(overall_quality).clamp(0.0, 100.0).round()
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

fn score_of(validation: &ValidationResult, name: &str) -> f64 {
    validation.check(name).map(|c| c.score).unwrap_or(0.0)
}
