//! Vision-language agent that drives a phone over ADB.

use async_trait::async_trait;
use serde_json::Value;

use crate::actions::{finish_action, parse_action, ActionHandler};
use crate::adb::AdbDevice;
use crate::config::{get_messages, get_system_prompt};
use crate::model::{MessageBuilder, ModelClient, ModelConfig};

use super::step::{AgentConfig, AgentError, StepAgent, StepResult};

/// AI-powered agent for automating Android phone interactions.
///
/// Each step captures the screen, asks the model for the next operation and
/// executes it. The device is resolved from [`AgentConfig::device_id`] on every
/// step, so changing the config between steps retargets the agent.
///
/// # Example
///
/// ```rust,no_run
/// use phone_agent_api::{ActionHandler, AgentConfig, ModelConfig, PhoneAgent, StepAgent};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut agent = PhoneAgent::new(
///         ModelConfig::default(),
///         AgentConfig::default(),
///         ActionHandler::default(),
///     );
///     let mut result = agent.step(Some("打开微信")).await?;
///     while !result.finished && agent.step_count() < agent.config().max_steps {
///         result = agent.step(None).await?;
///     }
///     println!("{:?}", result.message);
///     Ok(())
/// }
/// ```
pub struct PhoneAgent {
    model_client: ModelClient,
    agent_config: AgentConfig,
    action_handler: ActionHandler,
    context: Vec<Value>,
    step_count: u32,
}

impl PhoneAgent {
    pub fn new(
        model_config: ModelConfig,
        agent_config: AgentConfig,
        action_handler: ActionHandler,
    ) -> Self {
        Self {
            model_client: ModelClient::new(model_config),
            agent_config,
            action_handler,
            context: Vec::new(),
            step_count: 0,
        }
    }

    /// Get the current conversation context.
    pub fn context(&self) -> &[Value] {
        &self.context
    }

    fn device(&self) -> AdbDevice {
        AdbDevice::new(
            self.agent_config.adb_path.clone(),
            self.agent_config.device_id.clone(),
        )
    }

    async fn execute_step(
        &mut self,
        user_prompt: Option<&str>,
        is_first: bool,
    ) -> Result<StepResult, AgentError> {
        self.step_count += 1;

        let device = self.device();
        let screenshot = device.screenshot().await;
        let current_app = device.current_app().await;
        let screen_info = MessageBuilder::build_screen_info(&current_app);

        if is_first {
            self.context.push(MessageBuilder::create_system_message(
                &get_system_prompt(self.agent_config.lang),
            ));
            let text = format!("{}\n\n{}", user_prompt.unwrap_or(""), screen_info);
            self.context.push(MessageBuilder::create_user_message(
                &text,
                Some(&screenshot.base64_data),
            ));
        } else {
            let text = format!("** Screen Info **\n\n{}", screen_info);
            self.context.push(MessageBuilder::create_user_message(
                &text,
                Some(&screenshot.base64_data),
            ));
        }

        let response = self.model_client.request(&self.context).await?;

        let action = parse_action(&response.action).unwrap_or_else(|e| {
            tracing::warn!("{}; treating the answer as a final message", e);
            finish_action(Some(&response.action))
        });

        self.log_step(&response.thinking, &action);

        // Only the latest screenshot is kept in context.
        if let Some(last) = self.context.last_mut() {
            MessageBuilder::remove_images_from_message(last);
        }

        let result = self
            .action_handler
            .execute(&device, &action, screenshot.width, screenshot.height)
            .await;

        self.context.push(MessageBuilder::create_assistant_message(&format!(
            "<think>{}</think><answer>{}</answer>",
            response.thinking, response.action
        )));

        let finish_message = action
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let finished = action.get("_metadata").and_then(Value::as_str) == Some("finish")
            || result.should_finish;

        let message = result.message.or(finish_message);
        if finished {
            let msgs = get_messages(self.agent_config.lang);
            tracing::info!(
                "{}: {}",
                msgs.task_completed,
                message.as_deref().unwrap_or(msgs.done)
            );
        }

        Ok(StepResult {
            success: result.success,
            finished,
            action: Some(action),
            thinking: response.thinking,
            message,
        })
    }

    fn log_step(&self, thinking: &str, action: &Value) {
        let msgs = get_messages(self.agent_config.lang);
        let action = serde_json::to_string(action).unwrap_or_default();
        if self.agent_config.verbose {
            tracing::info!("{} {} {}: {}", msgs.step, self.step_count, msgs.thinking, thinking);
            tracing::info!("{} {} {}: {}", msgs.step, self.step_count, msgs.action, action);
        } else {
            tracing::debug!(step = self.step_count, %thinking, %action, "agent step");
        }
    }
}

#[async_trait]
impl StepAgent for PhoneAgent {
    fn reset(&mut self) {
        self.context.clear();
        self.step_count = 0;
    }

    async fn step(&mut self, task: Option<&str>) -> Result<StepResult, AgentError> {
        let is_first = self.context.is_empty();
        if is_first && task.is_none() {
            return Err(AgentError::TaskRequired);
        }
        self.execute_step(task, is_first).await
    }

    fn step_count(&self) -> u32 {
        self.step_count
    }

    fn config(&self) -> &AgentConfig {
        &self.agent_config
    }

    fn config_mut(&mut self) -> &mut AgentConfig {
        &mut self.agent_config
    }
}
