//! Model client module for AI inference.

mod client;

pub use client::{
    ChatCompletion, MessageBuilder, ModelClient, ModelConfig, ModelError, ModelResponse, Usage,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};
