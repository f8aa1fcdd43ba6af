use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent {agent} failed: {message}")]
    Agent { agent: String, message: String },

    #[error("Agent payload parse error: {0}")]
    Parse(String),

    #[error("Agent {agent} timed out after {seconds} seconds")]
    Timeout { agent: String, seconds: u64 },

    #[error("Validation rule '{rule}' failed to run: {message}")]
    Rule { rule: String, message: String },

    #[error("Phase 1 agent {agent} failed, run aborted: {message}")]
    Phase1 { agent: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn agent(agent: &str, message: impl Into<String>) -> Self {
        AgentError::Agent {
            agent: agent.to_string(),
            message: message.into(),
        }
    }

    pub fn rule(rule: &str, message: impl Into<String>) -> Self {
        AgentError::Rule {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}
