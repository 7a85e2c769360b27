//! Test doubles for the agent and the device enumerator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::adb::{AdbError, DeviceInfo, DeviceLister};
use crate::agent::{AgentConfig, AgentError, StepAgent, StepResult};
use crate::model::ModelError;

use super::orchestrator::{TaskOrchestrator, TaskStatus};

pub(crate) enum Scripted {
    Step(StepResult),
    Fail(String),
    Panic,
}

impl Scripted {
    pub(crate) fn step(thinking: &str, action: &str) -> Self {
        Scripted::Step(StepResult {
            success: true,
            finished: false,
            action: Some(json!({"_metadata": "do", "action": action})),
            thinking: thinking.to_string(),
            message: None,
        })
    }

    pub(crate) fn finish(message: &str) -> Self {
        Scripted::Step(StepResult {
            success: true,
            finished: true,
            action: Some(json!({"_metadata": "finish", "message": message})),
            thinking: format!("finishing: {}", message),
            message: Some(message.to_string()),
        })
    }
}

/// Plays back a fixed list of step outcomes, then finishes with "done".
pub(crate) struct ScriptedAgent {
    script: VecDeque<Scripted>,
    gate: Option<Arc<Semaphore>>,
    config: AgentConfig,
    steps: u32,
    seen_devices: Arc<StdMutex<Vec<Option<String>>>>,
}

impl ScriptedAgent {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: script.into(),
            gate: None,
            config: AgentConfig::default().quiet(),
            steps: 0,
            seen_devices: Arc::default(),
        }
    }

    /// Every step waits for one permit of the returned semaphore.
    pub(crate) fn gated(script: Vec<Scripted>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let agent = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new(script)
        };
        (agent, gate)
    }

    /// Device id in effect at each `reset`.
    pub(crate) fn seen_devices(&self) -> Arc<StdMutex<Vec<Option<String>>>> {
        Arc::clone(&self.seen_devices)
    }
}

#[async_trait]
impl StepAgent for ScriptedAgent {
    fn reset(&mut self) {
        self.steps = 0;
        self.seen_devices
            .lock()
            .unwrap()
            .push(self.config.device_id.clone());
    }

    async fn step(&mut self, task: Option<&str>) -> Result<StepResult, AgentError> {
        if self.steps == 0 && task.is_none() {
            return Err(AgentError::TaskRequired);
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.steps += 1;

        match self.script.pop_front() {
            Some(Scripted::Step(result)) => Ok(result),
            Some(Scripted::Fail(reason)) => Err(AgentError::Model(ModelError::ParseError(reason))),
            Some(Scripted::Panic) => panic!("scripted agent panic"),
            None => match Scripted::finish("done") {
                Scripted::Step(result) => Ok(result),
                _ => unreachable!(),
            },
        }
    }

    fn step_count(&self) -> u32 {
        self.steps
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut AgentConfig {
        &mut self.config
    }
}

/// Returns the same device list (or failure) on every call.
pub(crate) struct FixedLister(pub(crate) Result<Vec<DeviceInfo>, String>);

#[async_trait]
impl DeviceLister for FixedLister {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, AdbError> {
        self.0.clone().map_err(AdbError::CommandFailed)
    }
}

/// Poll the orchestrator until `done` holds, failing after five seconds.
pub(crate) async fn wait_for(
    orchestrator: &TaskOrchestrator,
    done: impl Fn(&TaskStatus) -> bool,
) -> TaskStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = orchestrator.status().await;
            if done(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("orchestrator did not reach the expected state")
}
