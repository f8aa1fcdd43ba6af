//! Augur - market signal aggregation, validation and synthesis
//!
//! Pulls market data from rate-limited sources with fallback and
//! cross-source verification, validates the outputs of independent signal
//! agents and votes them into one multi-timeframe prediction.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use augur::models::{AugurConfig, RawAgentOutput, SynthesizedPrediction};
//! use augur::agents::{Orchestrator, SignalAgent, ValidationEngine};
//! use augur::data::{DataProvider, SourceFetcher};
//! ```

pub use augur_agents as agents;
pub use augur_data as data;
pub use augur_models as models;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use augur_agents::{
    AgentError, Orchestrator, SignalAgent, SynthesisAgent, SynthesisEngine, SynthesisInput,
    ValidationEngine,
};
use augur_data::DataProvider;
use augur_models::agent_output::{RawAgentOutput, ValidatedAgentOutput};
use augur_models::config::AugurConfig;
use augur_models::signal::SynthesizedPrediction;

/// Load configuration from a TOML file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<AugurConfig, anyhow::Error> {
    let Some(path) = path else {
        return Ok(AugurConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Data provider with the configured cache, health and rate limits.
/// Sources are registered by the caller.
pub fn build_provider(config: &AugurConfig) -> DataProvider {
    DataProvider::new(&config.data, config.verification.clone())
}

/// Orchestrator over the given Phase-1 agents, with the built-in
/// synthesis agent appended.
pub fn build_orchestrator(
    config: &AugurConfig,
    phase_one: Vec<Arc<dyn SignalAgent>>,
) -> Result<Orchestrator, AgentError> {
    let mut agents = phase_one;
    agents.push(Arc::new(SynthesisAgent::new(SynthesisEngine::new(
        config.synthesis.clone(),
    ))));
    Orchestrator::new(
        agents,
        ValidationEngine::new(config.validation.clone()),
        SynthesisEngine::new(config.synthesis.clone()),
        config.orchestrator.clone(),
    )
}

pub fn validate(config: &AugurConfig, output: &RawAgentOutput) -> ValidatedAgentOutput {
    ValidationEngine::new(config.validation.clone()).validate(output)
}

pub fn synthesize(config: &AugurConfig, input: &SynthesisInput) -> SynthesizedPrediction {
    SynthesisEngine::new(config.synthesis.clone()).synthesize(input)
}
