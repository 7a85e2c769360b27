//! Single-slot task execution with a pollable status record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::{AgentError, StepAgent, StepResult};

/// Final message when the agent finishes without one of its own.
pub const DEFAULT_COMPLETION_MESSAGE: &str = "Task completed successfully!";

/// Final message of a task cancelled through [`TaskOrchestrator::stop`].
pub const STOPPED_MESSAGE: &str = "Task stopped by user";

/// Final message of a task cancelled by [`TaskOrchestrator::shutdown`].
pub const SHUTDOWN_MESSAGE: &str = "Task cancelled: server shutting down";

/// Progress entries keep at most this many characters of thinking.
pub const THINKING_PREVIEW_CHARS: usize = 200;

/// The agent, shared between the orchestrator and its worker.
pub type SharedAgent = Arc<Mutex<Box<dyn StepAgent>>>;

#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("Agent not initialized")]
    NotInitialized,
    #[error("Task must not be empty")]
    InvalidTask,
    #[error("Another task is already running")]
    AlreadyRunning { current_task: Option<String> },
    #[error("No task is running")]
    NotRunning,
}

/// One completed step as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub step: u32,
    pub thinking: String,
    /// Name of the `do(...)` action, `None` for `finish(...)`.
    #[serde(rename = "action")]
    pub action_name: Option<String>,
}

/// Status of the current or most recent task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub running: bool,
    pub task: Option<String>,
    pub step: u32,
    pub message: Option<String>,
    pub error: Option<String>,
    pub thinking: Option<String>,
    pub action: Option<Value>,
    pub progress: Vec<ProgressEntry>,
    pub task_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskStatus {
    fn started(task_id: Uuid, task: &str) -> Self {
        Self {
            running: true,
            task: Some(task.to_string()),
            task_id: Some(task_id),
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Whether the worker for `task_id` may still write this record.
    fn is_owned_by(&self, task_id: Uuid) -> bool {
        self.running && self.task_id == Some(task_id)
    }
}

/// Shorten thinking for a progress entry: 200 characters plus `...`.
pub fn truncate_thinking(thinking: &str) -> String {
    match thinking.char_indices().nth(THINKING_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &thinking[..cut]),
        None => thinking.to_string(),
    }
}

/// A task accepted by [`TaskOrchestrator::start`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskAccepted {
    pub task_id: Uuid,
    pub task: String,
}

struct ActiveTask {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs at most one agent task at a time on a background worker.
///
/// Lock order is `status` before `slot`.
pub struct TaskOrchestrator {
    agent: Option<SharedAgent>,
    status: Arc<Mutex<TaskStatus>>,
    slot: Mutex<Option<ActiveTask>>,
}

impl TaskOrchestrator {
    pub fn new(agent: Option<Box<dyn StepAgent>>) -> Self {
        Self {
            agent: agent.map(|a| Arc::new(Mutex::new(a))),
            status: Arc::new(Mutex::new(TaskStatus::default())),
            slot: Mutex::new(None),
        }
    }

    pub fn agent_initialized(&self) -> bool {
        self.agent.is_some()
    }

    /// Accept `task` and start running it in the background.
    ///
    /// `device_id` overrides the agent's device for this task only.
    pub async fn start(
        &self,
        task: &str,
        device_id: Option<String>,
    ) -> Result<TaskAccepted, TaskError> {
        let agent = self.agent.clone().ok_or(TaskError::NotInitialized)?;
        if task.trim().is_empty() {
            return Err(TaskError::InvalidTask);
        }

        let mut status = self.status.lock().await;
        if status.running {
            return Err(TaskError::AlreadyRunning {
                current_task: status.task.clone(),
            });
        }

        let task_id = Uuid::new_v4();
        *status = TaskStatus::started(task_id, task);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            agent,
            Arc::clone(&self.status),
            task_id,
            task.to_string(),
            device_id.filter(|d| !d.trim().is_empty()),
            cancel.clone(),
        ));
        *self.slot.lock().await = Some(ActiveTask {
            id: task_id,
            cancel,
            handle,
        });
        drop(status);

        tracing::info!(%task_id, "Task started: {}", task);
        Ok(TaskAccepted {
            task_id,
            task: task.to_string(),
        })
    }

    /// Snapshot of the status record.
    pub async fn status(&self) -> TaskStatus {
        self.status.lock().await.clone()
    }

    /// Mark the running task as stopped and cancel its worker without waiting.
    pub async fn stop(&self) -> Result<(), TaskError> {
        let mut status = self.status.lock().await;
        if !status.running {
            return Err(TaskError::NotRunning);
        }

        status.running = false;
        status.message = Some(STOPPED_MESSAGE.to_string());
        status.finished_at = Some(Utc::now());

        if let Some(active) = self.slot.lock().await.as_ref() {
            if status.task_id == Some(active.id) {
                active.cancel.cancel();
            }
        }
        tracing::info!(task_id = ?status.task_id, "Task stopped by user");
        Ok(())
    }

    /// Cancel the current worker, if any, and wait for it to exit.
    pub async fn shutdown(&self) {
        {
            let mut status = self.status.lock().await;
            if status.running {
                status.running = false;
                status.message = Some(SHUTDOWN_MESSAGE.to_string());
                status.finished_at = Some(Utc::now());
            }
        }

        let active = self.slot.lock().await.take();
        if let Some(active) = active {
            active.cancel.cancel();
            if let Err(e) = active.handle.await {
                tracing::warn!(task_id = %active.id, "Worker ended abnormally: {}", e);
            }
        }
    }
}

enum Outcome {
    Completed(StepResult),
    Failed(AgentError),
    Cancelled,
}

/// Runs the task on an inner task so a panicking agent is recorded as a fault.
async fn run_worker(
    agent: SharedAgent,
    status: Arc<Mutex<TaskStatus>>,
    task_id: Uuid,
    task: String,
    device_id: Option<String>,
    cancel: CancellationToken,
) {
    let inner = tokio::spawn(execute(
        agent,
        Arc::clone(&status),
        task_id,
        task,
        device_id,
        cancel,
    ));

    if let Err(e) = inner.await {
        let mut status = status.lock().await;
        if status.is_owned_by(task_id) {
            let error = if e.is_panic() {
                format!("Task worker panicked: {}", e)
            } else {
                format!("Task worker aborted: {}", e)
            };
            tracing::error!(%task_id, "{}", error);
            let step = status.step;
            record_fault(&mut status, step, error);
        }
    }
}

async fn execute(
    shared: SharedAgent,
    status: Arc<Mutex<TaskStatus>>,
    task_id: Uuid,
    task: String,
    device_id: Option<String>,
    cancel: CancellationToken,
) {
    let guard = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        guard = shared.lock() => guard,
    };

    let mut run = AgentRun::new(guard, device_id);
    run.agent().reset();

    let outcome = drive(run.agent(), &status, task_id, &task, &cancel).await;
    let step = run.agent().step_count();
    drop(run);

    let mut status = status.lock().await;
    if !status.is_owned_by(task_id) {
        return;
    }
    match outcome {
        Outcome::Completed(result) => {
            let message = result
                .message
                .unwrap_or_else(|| DEFAULT_COMPLETION_MESSAGE.to_string());
            tracing::info!(%task_id, step, "Task finished: {}", message);
            status.running = false;
            status.step = step;
            status.message = Some(message);
            status.error = None;
            status.thinking = Some(result.thinking);
            status.action = result.action;
            status.finished_at = Some(Utc::now());
        }
        Outcome::Failed(e) => {
            tracing::warn!(%task_id, step, "Task failed: {}", e);
            record_fault(&mut status, step, e.to_string());
        }
        Outcome::Cancelled => {}
    }
}

/// Exclusive use of the agent for one task.
///
/// The device override is undone on drop, so cancellation and panics restore it too.
struct AgentRun<'a> {
    agent: MutexGuard<'a, Box<dyn StepAgent>>,
    previous_device: Option<String>,
}

impl<'a> AgentRun<'a> {
    fn new(mut agent: MutexGuard<'a, Box<dyn StepAgent>>, device_id: Option<String>) -> Self {
        let previous_device = agent.config().device_id.clone();
        if let Some(device_id) = device_id {
            agent.config_mut().device_id = Some(device_id);
        }
        Self {
            agent,
            previous_device,
        }
    }

    fn agent(&mut self) -> &mut dyn StepAgent {
        &mut **self.agent
    }
}

impl Drop for AgentRun<'_> {
    fn drop(&mut self) {
        self.agent.config_mut().device_id = self.previous_device.take();
    }
}

/// Step the agent until it finishes, hits `max_steps`, fails or is cancelled.
async fn drive(
    agent: &mut dyn StepAgent,
    status: &Mutex<TaskStatus>,
    task_id: Uuid,
    task: &str,
    cancel: &CancellationToken,
) -> Outcome {
    let mut prompt = Some(task);
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            result = agent.step(prompt.take()) => result,
        };

        let result = match result {
            Ok(result) => result,
            Err(e) => return Outcome::Failed(e),
        };

        let step = agent.step_count();
        {
            let mut status = status.lock().await;
            if !status.is_owned_by(task_id) {
                return Outcome::Cancelled;
            }
            status.step = step;
            status.thinking = Some(result.thinking.clone());
            status.action = result.action.clone();
            status.progress.push(ProgressEntry {
                step,
                thinking: truncate_thinking(&result.thinking),
                action_name: result.action_name().map(str::to_string),
            });
        }

        if result.finished || step >= agent.config().max_steps {
            return Outcome::Completed(result);
        }
    }
}

fn record_fault(status: &mut TaskStatus, step: u32, error: String) {
    status.running = false;
    status.step = step;
    status.message = None;
    status.error = Some(error);
    status.thinking = None;
    status.action = None;
    status.finished_at = Some(Utc::now());
}
