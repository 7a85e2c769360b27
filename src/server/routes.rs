//! HTTP route handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::adb::DeviceLister;

use super::error::ApiError;
use super::orchestrator::{TaskOrchestrator, TaskStatus};
use super::types::*;

const MISSING_TASK: &str = "Missing 'task' in request body";
const MISSING_MESSAGE: &str = "Missing 'message' in request body";
const STARTED_MESSAGE: &str = "Task execution started. Use /status to check progress.";

/// Shared application state.
pub struct AppState {
    pub orchestrator: TaskOrchestrator,
    /// Source of the live device list
    pub devices: Arc<dyn DeviceLister>,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/devices", get(list_devices))
        .route("/execute", post(execute_task))
        .route("/chat", post(chat))
        .route("/status", get(get_status))
        .route("/stop", post(stop_task))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `listener` until Ctrl-C or SIGTERM, then stop the running task.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Server listening on {}", addr);
    }

    axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, cancelling any running task");
    state.orchestrator.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Liveness plus a best-effort device list.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let devices = match state.devices.list_devices().await {
        Ok(devices) => devices.into_iter().map(HealthDevice::from).collect(),
        Err(e) => {
            tracing::warn!("Device enumeration failed: {}", e);
            Vec::new()
        }
    };

    Json(HealthResponse {
        status: "ok",
        agent_initialized: state.orchestrator.agent_initialized(),
        devices,
    })
}

async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DevicesResponse>, ApiError> {
    let devices = state
        .devices
        .list_devices()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(DevicesResponse {
        devices: devices.into_iter().map(DeviceEntry::from).collect(),
    }))
}

async fn execute_task(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ExecuteResponse>, ApiError> {
    start_task(&state, TaskRequest::from_body(&body)).await
}

/// Same as `/execute` once a `message` is present; no conversation state is kept.
async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let request = TaskRequest::from_body(&body);
    if request.as_ref().and_then(|r| r.message.as_ref()).is_none() {
        return Err(ApiError::InvalidArgument(MISSING_MESSAGE.to_string()));
    }
    start_task(&state, request).await
}

async fn start_task(
    state: &AppState,
    request: Option<TaskRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    if !state.orchestrator.agent_initialized() {
        return Err(ApiError::Internal("Agent not initialized".to_string()));
    }

    let request = request.unwrap_or_default();
    let task = request
        .task
        .ok_or_else(|| ApiError::InvalidArgument(MISSING_TASK.to_string()))?;

    let accepted = state.orchestrator.start(&task, request.device_id).await?;

    Ok(Json(ExecuteResponse {
        status: "started",
        task: accepted.task,
        task_id: accepted.task_id,
        message: STARTED_MESSAGE,
    }))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<TaskStatus> {
    Json(state.orchestrator.status().await)
}

async fn stop_task(State(state): State<Arc<AppState>>) -> Result<Json<StopResponse>, ApiError> {
    state.orchestrator.stop().await?;
    Ok(Json(StopResponse { status: "stopped" }))
}
