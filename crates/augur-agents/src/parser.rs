//! Collaborator boundary: turn an upstream's raw text into a `RawAgentOutput`.
//!
//! There is exactly one parse attempt. Text that is not the expected JSON
//! envelope becomes a fallback output with deliberately low confidence,
//! so bad upstream data shows up as low trust rather than as an error.

use std::time::Instant;

use async_trait::async_trait;
use augur_models::agent_output::RawAgentOutput;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use crate::agent::{AgentRequest, SignalAgent};
use crate::error::AgentError;

/// Confidence assigned to outputs whose payload could not be parsed.
pub const FALLBACK_CONFIDENCE: f64 = 25.0;

/// Shape an upstream must return.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentEnvelope {
    pub data: serde_json::Value,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Strictly parse `text` as an [`AgentEnvelope`].
pub fn parse_envelope(text: &str) -> Result<AgentEnvelope, AgentError> {
    let envelope: AgentEnvelope = serde_json::from_str(text.trim())
        .map_err(|e| AgentError::Parse(format!("{e} (length={})", text.len())))?;
    if !envelope.confidence.is_finite() {
        return Err(AgentError::Parse("confidence is not a finite number".to_string()));
    }
    Ok(envelope)
}

/// Low-confidence stand-in for an output whose payload was unusable.
pub fn fallback_output(agent: &str, symbol: &str, reason: &str, elapsed_ms: u64) -> RawAgentOutput {
    RawAgentOutput {
        agent: agent.to_string(),
        symbol: symbol.to_string(),
        timestamp: Utc::now(),
        data: serde_json::json!({
            "fallback": true,
            "error": reason,
        }),
        confidence: FALLBACK_CONFIDENCE,
        sources: vec![],
        processing_time_ms: elapsed_ms,
    }
}

/// Build an output from raw upstream text, falling back on parse failure.
pub fn output_from_text(agent: &str, symbol: &str, text: &str, started: Instant) -> RawAgentOutput {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match parse_envelope(text) {
        Ok(envelope) => RawAgentOutput {
            agent: agent.to_string(),
            symbol: symbol.to_string(),
            timestamp: Utc::now(),
            data: envelope.data,
            confidence: envelope.confidence.clamp(0.0, 100.0),
            sources: envelope.sources,
            processing_time_ms: elapsed_ms,
        },
        Err(e) => {
            warn!(agent, symbol, error = %e, "Malformed agent payload, using fallback");
            fallback_output(agent, symbol, &e.to_string(), elapsed_ms)
        }
    }
}

/// Anything that can produce an agent's raw text answer (an HTTP API,
/// an LLM call, a subprocess).
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn fetch_text(&self, request: &AgentRequest) -> Result<String, AgentError>;
}

/// Adapts a [`PayloadSource`] into a [`SignalAgent`].
///
/// Transport failures propagate; malformed payloads are demoted to a
/// fallback output.
pub struct TextAgent<S> {
    name: String,
    source: S,
}

impl<S: PayloadSource> TextAgent<S> {
    pub fn new(name: &str, source: S) -> Self {
        Self {
            name: name.to_string(),
            source,
        }
    }
}

#[async_trait]
impl<S: PayloadSource> SignalAgent for TextAgent<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: &AgentRequest) -> Result<RawAgentOutput, AgentError> {
        let started = Instant::now();
        let text = self.source.fetch_text(request).await?;
        Ok(output_from_text(&self.name, &request.symbol, &text, started))
    }
}
