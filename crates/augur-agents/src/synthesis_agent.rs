//! The built-in Phase-2 agent: votes the validated Phase-1 signals.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use augur_models::agent_kind::AgentKind;
use augur_models::agent_output::{RawAgentOutput, ValidatedAgentOutput};
use augur_models::signal::{AgentTimeframeSignals, Timeframe, TimeframeSignal};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::{AgentRequest, SignalAgent};
use crate::error::AgentError;
use crate::synthesis::{SynthesisEngine, SynthesisInput};

/// Context handed to the synthesis agent. Only validated outputs appear here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisContext {
    pub symbol: String,
    pub agents: Vec<ValidatedAgentOutput>,
    pub overall_quality: f64,
    pub validation_score: f64,
}

impl SynthesisContext {
    /// Pull each agent's `timeframes` block. Agents without a readable block
    /// abstain.
    pub fn signals(&self) -> Vec<AgentTimeframeSignals> {
        self.agents
            .iter()
            .filter_map(|validated| {
                let block = validated.output.data.get("timeframes")?;
                match serde_json::from_value::<BTreeMap<Timeframe, TimeframeSignal>>(block.clone()) {
                    Ok(timeframes) => Some(AgentTimeframeSignals {
                        agent: validated.agent().to_string(),
                        weight: 1.0,
                        timeframes,
                    }),
                    Err(e) => {
                        debug!(agent = %validated.agent(), error = %e, "Unreadable timeframes block");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn synthesis_input(&self) -> SynthesisInput {
        SynthesisInput {
            agents: self.signals(),
            overall_quality: self.overall_quality,
            validation_score: self.validation_score,
            as_of: Utc::now(),
        }
    }
}

pub struct SynthesisAgent {
    engine: SynthesisEngine,
}

impl SynthesisAgent {
    pub fn new(engine: SynthesisEngine) -> Self {
        Self { engine }
    }
}

impl Default for SynthesisAgent {
    fn default() -> Self {
        Self::new(SynthesisEngine::default())
    }
}

#[async_trait]
impl SignalAgent for SynthesisAgent {
    fn name(&self) -> &str {
        AgentKind::PredictionSynthesis.as_str()
    }

    async fn process(&self, request: &AgentRequest) -> Result<RawAgentOutput, AgentError> {
        let started = Instant::now();
        let context = request
            .context
            .clone()
            .ok_or_else(|| AgentError::agent(self.name(), "no Phase 1 context supplied"))?;
        let context: SynthesisContext = serde_json::from_value(context)?;

        let input = context.synthesis_input();
        let sources = input.agents.iter().map(|a| a.agent.clone()).collect();
        let prediction = self.engine.synthesize(&input);

        Ok(RawAgentOutput {
            agent: self.name().to_string(),
            symbol: request.symbol.clone(),
            timestamp: Utc::now(),
            data: serde_json::to_value(&prediction)?,
            confidence: prediction.confidence,
            sources,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_output;
    use crate::validation::ValidationEngine;
    use augur_models::signal::{Direction, SynthesizedPrediction};

    fn context(confidence: f64) -> SynthesisContext {
        let engine = ValidationEngine::default();
        let agents = AgentKind::PHASE_ONE
            .iter()
            .map(|kind| engine.validate(&fixture_output(*kind, confidence)))
            .collect();
        SynthesisContext {
            symbol: "AAPL".to_string(),
            agents,
            overall_quality: 96.0,
            validation_score: 100.0,
        }
    }

    #[tokio::test]
    async fn synthesizes_from_validated_context() {
        let ctx = context(80.0);
        let request = AgentRequest::with_context("AAPL", serde_json::to_value(&ctx).unwrap());
        let output = SynthesisAgent::default().process(&request).await.unwrap();

        assert_eq!(output.agent, "prediction_synthesis");
        assert_eq!(output.sources.len(), 7);
        let prediction: SynthesizedPrediction = serde_json::from_value(output.data).unwrap();
        assert_eq!(prediction.direction, Direction::Up);
        assert_eq!(prediction.confidence, 80.0);
        assert_eq!(output.confidence, 80.0);
    }

    #[tokio::test]
    async fn missing_context_is_an_error() {
        let err = SynthesisAgent::default()
            .process(&AgentRequest::new("AAPL"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Agent { .. }));
    }

    #[test]
    fn agents_without_timeframes_abstain() {
        let mut ctx = context(70.0);
        ctx.agents[0].output.data = serde_json::json!({"price": 1.0});
        ctx.agents[1].output.data["timeframes"] = serde_json::json!("soon");
        assert_eq!(ctx.signals().len(), 5);
    }
}
