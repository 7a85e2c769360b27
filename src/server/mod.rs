//! REST API over the phone agent.

mod error;
mod orchestrator;
mod routes;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ApiError;
pub use orchestrator::{
    truncate_thinking, ProgressEntry, SharedAgent, TaskAccepted, TaskError, TaskOrchestrator,
    TaskStatus, DEFAULT_COMPLETION_MESSAGE, SHUTDOWN_MESSAGE, STOPPED_MESSAGE, THINKING_PREVIEW_CHARS,
};
pub use routes::{router, serve, AppState};
pub use types::{
    DeviceEntry, DevicesResponse, ExecuteResponse, HealthDevice, HealthResponse, StopResponse,
    TaskRequest,
};
