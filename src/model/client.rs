//! Model client for AI inference using OpenAI-compatible API.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Upper bound for one chat completion round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API error ({status}): {body}")]
    ApiError { status: StatusCode, body: String },
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

impl ModelError {
    /// Network failures, 5xx and 429 are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            ModelError::RequestFailed(_) => true,
            ModelError::ApiError { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ModelError::ParseError(_) | ModelError::MaxRetriesExceeded(..) => false,
        }
    }
}

/// Configuration for the AI model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Omitted from the request when `None`.
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    /// Extra top-level fields merged into every request body.
    pub extra_body: HashMap<String, Value>,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "autoglm-phone-9b".to_string(),
            max_tokens: 3000,
            temperature: 0.0,
            top_p: Some(0.85),
            frequency_penalty: Some(0.2),
            extra_body: HashMap::from([("skip_special_tokens".to_string(), json!(false))]),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl ModelConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    /// Send only temperature and max tokens, leaving the rest to the endpoint.
    pub fn without_sampling_penalties(mut self) -> Self {
        self.top_p = None;
        self.frequency_penalty = None;
        self
    }

    /// Drop the vLLM-specific request fields; hosted endpoints reject them.
    pub fn without_extra_body(mut self) -> Self {
        self.extra_body.clear();
        self
    }
}

/// Response from the AI model, split into reasoning and action.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub thinking: String,
    pub action: String,
    pub raw_content: String,
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Raw text of the first choice of a chat completion.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Client for OpenAI-compatible vision-language models.
pub struct ModelClient {
    config: ModelConfig,
    client: Client,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { config, client }
    }

    /// Ask the model for the next step and split its answer.
    pub async fn request(&self, messages: &[Value]) -> Result<ModelResponse, ModelError> {
        let completion = self.chat(messages).await?;
        let (thinking, action) = parse_response(&completion.content);
        Ok(ModelResponse {
            thinking,
            action,
            raw_content: completion.content,
        })
    }

    /// Send a chat completion request, retrying transient failures.
    pub async fn chat(&self, messages: &[Value]) -> Result<ChatCompletion, ModelError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = self.request_body(messages);

        let max_attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &body).await {
                Ok(completion) => return Ok(completion),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt < max_attempts {
                        tracing::warn!(
                            "Model request failed (attempt {}/{}): {}; retrying in {}s",
                            attempt,
                            max_attempts,
                            e,
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(ModelError::MaxRetriesExceeded(
            self.config.max_retries,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    fn request_body(&self, messages: &[Value]) -> Value {
        let mut body = json!({
            "messages": messages,
            "model": self.config.model_name,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
        });

        if let Value::Object(ref mut map) = body {
            if let Some(top_p) = self.config.top_p {
                map.insert("top_p".to_string(), json!(top_p));
            }
            if let Some(penalty) = self.config.frequency_penalty {
                map.insert("frequency_penalty".to_string(), json!(penalty));
            }
            for (key, value) in &self.config.extra_body {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }

    async fn send_request(&self, url: &str, body: &Value) -> Result<ChatCompletion, ModelError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError { status, body });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        Ok(ChatCompletion {
            content,
            usage: completion.usage,
        })
    }
}

/// Split `<think>...</think><answer>...</answer>` into thinking and action.
///
/// Content without an `<answer>` tag is treated as a bare action.
pub(crate) fn parse_response(content: &str) -> (String, String) {
    let Some((head, tail)) = content.split_once("<answer>") else {
        return (String::new(), content.trim().to_string());
    };

    let thinking = head
        .replace("<think>", "")
        .replace("</think>", "")
        .trim()
        .to_string();
    let action = tail.replace("</answer>", "").trim().to_string();

    (thinking, action)
}

/// Helpers for building conversation messages.
pub struct MessageBuilder;

impl MessageBuilder {
    pub fn create_system_message(content: &str) -> Value {
        json!({
            "role": "system",
            "content": content
        })
    }

    /// Create a user message, optionally carrying a base64 PNG.
    pub fn create_user_message(text: &str, image_base64: Option<&str>) -> Value {
        let mut content = Vec::new();

        if let Some(img_data) = image_base64 {
            content.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/png;base64,{}", img_data)
                }
            }));
        }

        content.push(json!({
            "type": "text",
            "text": text
        }));

        json!({
            "role": "user",
            "content": content
        })
    }

    pub fn create_assistant_message(content: &str) -> Value {
        json!({
            "role": "assistant",
            "content": content
        })
    }

    /// Strip image parts from a message; only the latest screenshot is kept in context.
    pub fn remove_images_from_message(message: &mut Value) {
        if let Some(Value::Array(parts)) = message.get_mut("content") {
            parts.retain(|item| item.get("type").and_then(Value::as_str) == Some("text"));
        }
    }

    /// Screen info block sent alongside each screenshot.
    pub fn build_screen_info(current_app: &str) -> String {
        json!({ "current_app": current_app }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.model_name, "autoglm-phone-9b");
        assert_eq!(config.extra_body["skip_special_tokens"], json!(false));
        assert!(config.without_extra_body().extra_body.is_empty());
    }

    #[test]
    fn test_request_body_sampling_fields() {
        let default_body = ModelClient::new(ModelConfig::default()).request_body(&[]);
        assert!(default_body.get("top_p").is_some());
        assert!(default_body.get("frequency_penalty").is_some());
        assert_eq!(default_body["skip_special_tokens"], json!(false));

        let config = ModelConfig::default()
            .with_max_tokens(1024)
            .without_sampling_penalties()
            .without_extra_body();
        let body = ModelClient::new(config).request_body(&[]);
        assert!(body.get("top_p").is_none());
        assert!(body.get("frequency_penalty").is_none());
        assert!(body.get("skip_special_tokens").is_none());
        assert_eq!(body["temperature"], json!(0.0));
        assert_eq!(body["max_tokens"], json!(1024));
    }

    #[test]
    fn test_parse_response() {
        let content = "<think>I need to tap the button</think><answer>do(action=\"Tap\", element=[100, 200])</answer>";
        let (thinking, action) = parse_response(content);
        assert_eq!(thinking, "I need to tap the button");
        assert_eq!(action, "do(action=\"Tap\", element=[100, 200])");
    }

    #[test]
    fn test_parse_response_no_answer() {
        let (thinking, action) = parse_response("  some raw content ");
        assert_eq!(thinking, "");
        assert_eq!(action, "some raw content");
    }

    #[test]
    fn test_retryable_errors() {
        let server = ModelError::ApiError {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let limited = ModelError::ApiError {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        let auth = ModelError::ApiError {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert!(limited.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!ModelError::ParseError("x".into()).is_retryable());
    }

    #[test]
    fn test_message_builder() {
        let mut user_msg = MessageBuilder::create_user_message("Look at this", Some("base64data"));
        assert_eq!(user_msg["content"][0]["type"], "image_url");

        MessageBuilder::remove_images_from_message(&mut user_msg);
        assert_eq!(user_msg["content"].as_array().unwrap().len(), 1);
        assert_eq!(user_msg["content"][0]["text"], "Look at this");

        assert_eq!(
            MessageBuilder::build_screen_info("微信"),
            r#"{"current_app":"微信"}"#
        );
    }
}
