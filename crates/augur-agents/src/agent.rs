use async_trait::async_trait;
use augur_models::agent_output::RawAgentOutput;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AgentError;

/// Input handed to every agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRequest {
    pub request_id: Uuid,
    pub symbol: String,
    /// Phase-1 agents receive `None`; the synthesis agent receives the
    /// validated Phase-1 context.
    pub context: Option<serde_json::Value>,
}

impl AgentRequest {
    pub fn new(symbol: &str) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            context: None,
        }
    }

    pub fn with_context(symbol: &str, context: serde_json::Value) -> Self {
        Self {
            context: Some(context),
            ..Self::new(symbol)
        }
    }
}

/// Capability every signal agent provides. Mockable for testing.
#[async_trait]
pub trait SignalAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, request: &AgentRequest) -> Result<RawAgentOutput, AgentError>;
}
