pub mod agent_kind;
pub mod agent_output;
pub mod config;
pub mod health;
pub mod orchestration;
pub mod reading;
pub mod signal;

pub use agent_kind::{AgentKind, AgentProfile};
pub use agent_output::{
    QualityMetrics, RawAgentOutput, ReliabilityMetrics, ValidatedAgentOutput, ValidationCheck,
    ValidationResult,
};
pub use config::{
    AugurConfig, DataConfig, FailurePolicy, OrchestratorConfig, QualityWeights, RateLimitConfig,
    SynthesisConfig, ValidationConfig, VerificationConfig,
};
pub use health::ApiHealth;
pub use orchestration::{OrchestrationResult, RunMetadata, SourceContribution, ValidationSummary};
pub use reading::{DataCategory, DataSourceReading, QualityTier, NO_DATA_SOURCE};
pub use signal::{
    AgentTimeframeSignals, Direction, RiskLevel, SynthesizedPrediction, Timeframe,
    TimeframeSignal,
};
