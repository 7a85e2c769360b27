//! phone-agent-api - HTTP server entry point
//!
//! Builds the phone agent from flags/environment and serves the REST API.
//! Run with: cargo run --bin phone-agent-api -- --help

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use phone_agent_api::adb::{AdbConnection, DeviceLister};
use phone_agent_api::server::{serve, AppState, TaskOrchestrator};
use phone_agent_api::settings::ServerSettings;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before parsing so env fallbacks see it
    let _ = dotenvy::dotenv();
    let settings = ServerSettings::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Model: {} @ {} (lang={}, max_steps={})",
        settings.model,
        settings.base_url,
        settings.lang.as_str(),
        settings.max_steps
    );
    if settings.allow_sensitive {
        warn!("Sensitive operations will be approved without confirmation");
    }

    let devices = AdbConnection::with_path(&settings.adb_path);
    match devices.list_devices().await {
        Ok(found) if found.is_empty() => warn!("No ADB devices connected"),
        Ok(found) => {
            for device in &found {
                info!(
                    "Device {} ({}, {})",
                    device.device_id,
                    device.status,
                    device.connection_type.as_str()
                );
            }
        }
        Err(e) => warn!("Could not list ADB devices: {}", e),
    }

    let agent = settings.build_agent();
    let state = Arc::new(AppState {
        orchestrator: TaskOrchestrator::new(Some(Box::new(agent))),
        devices: Arc::new(devices) as Arc<dyn DeviceLister>,
    });

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(listener, state).await?;
    Ok(())
}
