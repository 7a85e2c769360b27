//! Agent module for orchestrating phone automation.

mod phone_agent;
mod step;

pub use phone_agent::PhoneAgent;
pub use step::{AgentConfig, AgentError, StepAgent, StepResult};
