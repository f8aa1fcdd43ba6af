pub mod agent;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod synthesis;
pub mod synthesis_agent;
pub mod validation;

pub mod test_support;

pub use agent::{AgentRequest, SignalAgent};
pub use error::AgentError;
pub use orchestrator::Orchestrator;
pub use parser::{PayloadSource, TextAgent};
pub use synthesis::{SynthesisEngine, SynthesisInput};
pub use synthesis_agent::{SynthesisAgent, SynthesisContext};
pub use validation::{ValidationEngine, ValidationRule};
