//! The step-wise agent contract the task server drives.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::Lang;
use crate::model::ModelError;

/// Agent errors.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Task required for first step")]
    TaskRequired,
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Configuration for the PhoneAgent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Maximum number of steps before stopping.
    pub max_steps: u32,
    /// Optional ADB device ID for multi-device setups.
    pub device_id: Option<String>,
    pub lang: Lang,
    /// Log thinking and actions at info level instead of debug.
    pub verbose: bool,
    pub adb_path: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            device_id: None,
            lang: Lang::Cn,
            verbose: true,
            adb_path: "adb".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_lang(mut self, lang: Lang) -> Self {
        self.lang = lang;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_adb_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    /// Disable verbose step logging.
    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self
    }
}

/// Result of a single agent step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    /// Whether the action was successful.
    pub success: bool,
    /// Whether the task is finished.
    pub finished: bool,
    /// The action that was executed.
    pub action: Option<Value>,
    /// The thinking process from the model.
    pub thinking: String,
    /// Optional message (e.g., finish message).
    pub message: Option<String>,
}

impl StepResult {
    /// Name of the executed `do(...)` action; `None` for `finish(...)`.
    pub fn action_name(&self) -> Option<&str> {
        self.action
            .as_ref()
            .filter(|a| a.get("_metadata").and_then(Value::as_str) == Some("do"))
            .and_then(|a| a.get("action"))
            .and_then(Value::as_str)
    }
}

/// An agent that advances a task one observation/action round at a time.
///
/// The first `step` of a task must carry the task text; later steps pass
/// `None` and continue from the agent's own context.
#[async_trait]
pub trait StepAgent: Send {
    /// Forget the previous task's context and step count.
    fn reset(&mut self);

    async fn step(&mut self, task: Option<&str>) -> Result<StepResult, AgentError>;

    fn step_count(&self) -> u32;

    fn config(&self) -> &AgentConfig;

    fn config_mut(&mut self) -> &mut AgentConfig;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 100);
        assert_eq!(config.lang, Lang::Cn);
        assert_eq!(config.adb_path, "adb");
        assert!(config.verbose);
    }

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::default()
            .with_device_id("device123")
            .with_lang(Lang::En)
            .with_max_steps(50)
            .with_adb_path("/opt/platform-tools/adb")
            .quiet();

        assert_eq!(config.device_id, Some("device123".to_string()));
        assert_eq!(config.lang, Lang::En);
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.adb_path, "/opt/platform-tools/adb");
        assert!(!config.verbose);
    }

    #[test]
    fn test_step_result_action_name() {
        let tap = StepResult {
            action: Some(json!({"_metadata": "do", "action": "Tap", "element": [1, 2]})),
            ..StepResult::default()
        };
        assert_eq!(tap.action_name(), Some("Tap"));

        let finish = StepResult {
            action: Some(json!({"_metadata": "finish", "message": "ok"})),
            ..StepResult::default()
        };
        assert_eq!(finish.action_name(), None);
        assert_eq!(StepResult::default().action_name(), None);
    }
}
