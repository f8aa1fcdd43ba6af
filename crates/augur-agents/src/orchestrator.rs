use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use augur_models::agent_output::{
    QualityMetrics, RawAgentOutput, ReliabilityMetrics, ValidatedAgentOutput,
};
use augur_models::config::{FailurePolicy, OrchestratorConfig};
use augur_models::orchestration::{
    OrchestrationResult, RunMetadata, SourceContribution, ValidationSummary,
};
use augur_models::signal::SynthesizedPrediction;
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::agent::{AgentRequest, SignalAgent};
use crate::error::AgentError;
use crate::parser::fallback_output;
use crate::synthesis::SynthesisEngine;
use crate::synthesis_agent::SynthesisContext;
use crate::validation::ValidationEngine;

/// Runs the independent agents concurrently, validates their outputs and
/// hands the validated set to the synthesis agent.
pub struct Orchestrator {
    phase_one: Vec<Arc<dyn SignalAgent>>,
    synthesis: Arc<dyn SignalAgent>,
    validation: ValidationEngine,
    synthesis_engine: SynthesisEngine,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// `agents` are positional: the first `config.phase_one_agents` run in
    /// Phase 1, the last one is the synthesis agent.
    pub fn new(
        mut agents: Vec<Arc<dyn SignalAgent>>,
        validation: ValidationEngine,
        synthesis_engine: SynthesisEngine,
        config: OrchestratorConfig,
    ) -> Result<Self, AgentError> {
        let expected = config.phase_one_agents + 1;
        if agents.len() != expected {
            return Err(AgentError::Configuration(format!(
                "expected {expected} agents ({} independent + 1 synthesis), got {}",
                config.phase_one_agents,
                agents.len()
            )));
        }
        let synthesis = agents
            .pop()
            .ok_or_else(|| AgentError::Configuration("no synthesis agent".to_string()))?;

        Ok(Self {
            phase_one: agents,
            synthesis,
            validation,
            synthesis_engine,
            config,
        })
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.phase_one
            .iter()
            .chain(std::iter::once(&self.synthesis))
            .map(|a| a.name())
            .collect()
    }

    pub async fn run(&self, symbol: &str) -> Result<OrchestrationResult, AgentError> {
        let start = Instant::now();
        let request = AgentRequest::new(symbol);
        info!(symbol, run_id = %request.request_id, agents = self.phase_one.len(), "Starting run");

        let mut warnings = Vec::new();

        // Phase 1
        let (outputs, failed_agents) = self.run_phase_one(&request).await?;
        for name in &failed_agents {
            warnings.push(format!("Agent {name} failed and was excluded"));
        }
        let mut validated: Vec<ValidatedAgentOutput> =
            outputs.iter().map(|o| self.validation.validate(o)).collect();

        // Phase 2
        let context = SynthesisContext {
            symbol: symbol.to_string(),
            overall_quality: average_quality(&validated).overall_quality,
            validation_score: ValidationSummary::from_outputs(&validated).overall_score,
            agents: validated.clone(),
        };
        let synthesis_raw = self.run_phase_two(&request, &context, &mut warnings).await?;
        let synthesis_validated = self.validation.validate(&synthesis_raw);

        let predictions = match serde_json::from_value::<SynthesizedPrediction>(
            synthesis_validated.output.data.clone(),
        ) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(symbol, error = %e, "Synthesis payload unreadable, recomputing locally");
                warnings.push(format!(
                    "Synthesis payload unreadable ({e}), prediction recomputed from Phase 1 signals"
                ));
                self.synthesis_engine.synthesize(&context.synthesis_input())
            }
        };
        validated.push(synthesis_validated);

        // Aggregates over every agent, synthesis included
        let low_quality_agents: Vec<String> = validated
            .iter()
            .filter(|v| {
                v.quality_metrics.overall_quality < self.config.low_quality_cutoff
                    || !v.validation.passed
            })
            .map(|v| v.agent().to_string())
            .collect();
        if low_quality_agents.len() > self.config.max_low_quality_agents {
            warn!(
                symbol,
                count = low_quality_agents.len(),
                agents = ?low_quality_agents,
                "Too many low-quality agents"
            );
            warnings.push(format!(
                "{} agents below quality {}: {}",
                low_quality_agents.len(),
                self.config.low_quality_cutoff,
                low_quality_agents.join(", ")
            ));
        }

        let overall_confidence = validated
            .iter()
            .map(|v| v.confidence() * self.config.weight_for(v.agent()))
            .sum::<f64>()
            .clamp(0.0, 100.0)
            .round();

        let metadata = RunMetadata {
            overall_quality: average_quality(&validated),
            validation_summary: ValidationSummary::from_outputs(&validated),
            reliability_metrics: average_reliability(&validated),
            transparency_report: transparency_report(&validated),
            overall_confidence,
            low_quality_agents,
            failed_agents,
            warnings,
            elapsed_ms: start.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        };

        info!(
            symbol,
            direction = ?predictions.direction,
            confidence = predictions.confidence,
            overall_confidence,
            elapsed_ms = metadata.elapsed_ms,
            "Run complete"
        );

        Ok(OrchestrationResult {
            run_id: request.request_id,
            symbol: symbol.to_string(),
            predictions,
            per_agent_results: validated,
            metadata,
        })
    }

    fn timeout(&self) -> Option<Duration> {
        self.config
            .enforce_timeouts
            .then(|| Duration::from_secs(self.config.agent_timeout_seconds))
    }

    /// Returns outputs in positional order and the names of dropped agents.
    async fn run_phase_one(
        &self,
        request: &AgentRequest,
    ) -> Result<(Vec<RawAgentOutput>, Vec<String>), AgentError> {
        let mut join_set = JoinSet::new();
        let mut task_names = HashMap::new();

        for (index, agent) in self.phase_one.iter().enumerate() {
            let agent = Arc::clone(agent);
            let name = agent.name().to_string();
            let request = request.clone();
            let timeout = self.timeout();
            let handle = join_set.spawn(async move {
                let agent_start = Instant::now();
                let result = call_agent(agent.as_ref(), &request, timeout).await;
                (index, agent.name().to_string(), result, agent_start.elapsed())
            });
            task_names.insert(handle.id(), name);
        }

        let mut slots: Vec<Option<RawAgentOutput>> = vec![None; self.phase_one.len()];
        let mut failed = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            let (name, err) = match joined {
                Ok((index, name, Ok(output), elapsed)) => {
                    info!(agent = %name, confidence = output.confidence, elapsed_ms = elapsed.as_millis() as u64, "Agent succeeded");
                    slots[index] = Some(output);
                    continue;
                }
                Ok((_, name, Err(e), elapsed)) => {
                    warn!(agent = %name, error = %e, elapsed_ms = elapsed.as_millis() as u64, "Agent failed");
                    (name, e.to_string())
                }
                Err(e) => {
                    error!(error = %e, "Agent task panicked");
                    let name = task_names
                        .get(&e.id())
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string());
                    (name, e.to_string())
                }
            };

            match self.config.failure_policy {
                FailurePolicy::FailFast => {
                    join_set.abort_all();
                    return Err(AgentError::Phase1 {
                        agent: name,
                        message: err,
                    });
                }
                FailurePolicy::PartialResults => failed.push(name),
            }
        }

        failed.sort();
        Ok((slots.into_iter().flatten().collect(), failed))
    }

    /// A failing synthesis agent degrades to a fallback output; the
    /// prediction is then recomputed locally.
    async fn run_phase_two(
        &self,
        request: &AgentRequest,
        context: &SynthesisContext,
        warnings: &mut Vec<String>,
    ) -> Result<RawAgentOutput, AgentError> {
        let request = AgentRequest {
            context: Some(serde_json::to_value(context)?),
            ..request.clone()
        };
        let started = Instant::now();
        match call_agent(self.synthesis.as_ref(), &request, self.timeout()).await {
            Ok(output) => Ok(output),
            Err(e) => {
                warn!(agent = %self.synthesis.name(), error = %e, "Synthesis agent failed");
                warnings.push(format!("Synthesis agent failed: {e}"));
                Ok(fallback_output(
                    self.synthesis.name(),
                    &request.symbol,
                    &e.to_string(),
                    started.elapsed().as_millis() as u64,
                ))
            }
        }
    }
}

async fn call_agent(
    agent: &dyn SignalAgent,
    request: &AgentRequest,
    timeout: Option<Duration>,
) -> Result<RawAgentOutput, AgentError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, agent.process(request))
            .await
            .unwrap_or_else(|_| {
                Err(AgentError::Timeout {
                    agent: agent.name().to_string(),
                    seconds: limit.as_secs(),
                })
            }),
        None => agent.process(request).await,
    }
}

fn average_quality(outputs: &[ValidatedAgentOutput]) -> QualityMetrics {
    if outputs.is_empty() {
        return QualityMetrics::default();
    }
    let n = outputs.len() as f64;
    let avg = |f: fn(&QualityMetrics) -> f64| {
        (outputs.iter().map(|o| f(&o.quality_metrics)).sum::<f64>() / n).round()
    };
    QualityMetrics {
        data_freshness: avg(|q| q.data_freshness),
        source_reliability: avg(|q| q.source_reliability),
        cross_verification: avg(|q| q.cross_verification),
        anomaly_score: avg(|q| q.anomaly_score),
        completeness: avg(|q| q.completeness),
        consistency: avg(|q| q.consistency),
        overall_quality: avg(|q| q.overall_quality),
        warnings: vec![],
    }
}

fn average_reliability(outputs: &[ValidatedAgentOutput]) -> ReliabilityMetrics {
    if outputs.is_empty() {
        return ReliabilityMetrics::default();
    }
    let n = outputs.len() as f64;
    let avg = |f: fn(&ReliabilityMetrics) -> f64| {
        (outputs.iter().map(|o| f(&o.reliability)).sum::<f64>() / n).round()
    };
    ReliabilityMetrics {
        historical_accuracy: avg(|r| r.historical_accuracy),
        data_source_health: avg(|r| r.data_source_health),
        signal_strength: avg(|r| r.signal_strength),
    }
}

fn transparency_report(outputs: &[ValidatedAgentOutput]) -> Vec<SourceContribution> {
    let mut by_source: BTreeMap<&str, SourceContribution> = BTreeMap::new();
    for validated in outputs {
        let mut seen = Vec::new();
        for source in &validated.output.sources {
            if seen.contains(&source) {
                continue;
            }
            seen.push(source);
            let entry = by_source
                .entry(source.as_str())
                .or_insert_with(|| SourceContribution {
                    source: source.clone(),
                    reliability: 0.0,
                    contribution: 0.0,
                    cited_by: vec![],
                });
            entry.reliability = entry.reliability.max(validated.reliability.data_source_health);
            entry.contribution += validated.reliability.signal_strength;
            entry.cited_by.push(validated.agent().to_string());
        }
    }

    let mut report: Vec<SourceContribution> = by_source.into_values().collect();
    report.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_output, MockAgent};
    use augur_models::agent_kind::AgentKind;

    fn validated(agent: &str, sources: &[&str], health: f64, strength: f64) -> ValidatedAgentOutput {
        let mut raw = fixture_output(AgentKind::MarketData, 50.0);
        raw.agent = agent.to_string();
        raw.sources = sources.iter().map(|s| s.to_string()).collect();
        let mut v = ValidationEngine::default().validate(&raw);
        v.reliability.data_source_health = health;
        v.reliability.signal_strength = strength;
        v
    }

    #[test]
    fn transparency_merges_and_ranks_sources() {
        let outputs = vec![
            validated("a", &["polygon.io", "reuters.com", "polygon.io"], 50.0, 30.0),
            validated("b", &["polygon.io"], 90.0, 40.0),
            validated("c", &["sec.gov"], 100.0, 10.0),
        ];
        let report = transparency_report(&outputs);

        assert_eq!(report.len(), 3);
        assert_eq!(report[0].source, "polygon.io");
        assert_eq!(report[0].reliability, 90.0);
        assert_eq!(report[0].contribution, 70.0);
        assert_eq!(report[0].cited_by, vec!["a", "b"]);
        assert_eq!(report[1].source, "reuters.com");
        assert_eq!(report[2].source, "sec.gov");
    }

    #[test]
    fn wrong_agent_count_is_rejected() {
        let agents: Vec<Arc<dyn SignalAgent>> = vec![Arc::new(MockAgent::for_kind(
            AgentKind::MarketData,
            50.0,
        ))];
        let result = Orchestrator::new(
            agents,
            ValidationEngine::default(),
            SynthesisEngine::default(),
            OrchestratorConfig::default(),
        );
        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[test]
    fn averages_are_per_field() {
        let a = QualityMetrics {
            data_freshness: 100.0,
            overall_quality: 90.0,
            ..Default::default()
        };
        let b = QualityMetrics {
            data_freshness: 50.0,
            overall_quality: 60.0,
            ..Default::default()
        };

        let mut first = validated("a", &[], 0.0, 0.0);
        first.quality_metrics = a;
        let mut second = validated("b", &[], 0.0, 0.0);
        second.quality_metrics = b;

        let avg = average_quality(&[first, second]);
        assert_eq!(avg.data_freshness, 75.0);
        assert_eq!(avg.overall_quality, 75.0);
        assert!(avg.warnings.is_empty());
    }
}
