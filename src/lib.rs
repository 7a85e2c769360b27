// Copyright 2025 Zhipu AI (Original Python implementation)
// Copyright 2025 ModerRAS (Rust implementation)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Phone Agent API
//!
//! REST API server for an AI-powered Android phone agent.
//!
//! The agent uses a vision-language model to read the screen and drives the
//! device over ADB. This crate runs one agent task at a time in the
//! background and lets HTTP clients start, poll and stop it.
//!
//! ## Serving the API
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use phone_agent_api::adb::AdbConnection;
//! use phone_agent_api::server::{serve, AppState, TaskOrchestrator};
//! use phone_agent_api::{ActionHandler, AgentConfig, ModelConfig, PhoneAgent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let agent = PhoneAgent::new(
//!         ModelConfig::default(),
//!         AgentConfig::default(),
//!         ActionHandler::default(),
//!     );
//!     let state = Arc::new(AppState {
//!         orchestrator: TaskOrchestrator::new(Some(Box::new(agent))),
//!         devices: Arc::new(AdbConnection::new()),
//!     });
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8765").await?;
//!     serve(listener, state).await?;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod adb;
pub mod agent;
pub mod config;
pub mod model;
pub mod server;
pub mod settings;

pub use actions::{ActionHandler, ActionResult};
pub use agent::{AgentConfig, AgentError, PhoneAgent, StepAgent, StepResult};
pub use model::{ModelClient, ModelConfig, ModelResponse};
pub use server::{AppState, TaskOrchestrator, TaskStatus};
pub use settings::ServerSettings;
