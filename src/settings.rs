//! Command-line and environment settings for the API server.
//!
//! Every flag falls back to a `PHONE_AGENT_*` environment variable, which may
//! come from a `.env` file loaded before parsing.

use clap::Parser;

use crate::actions::ActionHandler;
use crate::agent::{AgentConfig, PhoneAgent};
use crate::config::Lang;
use crate::model::{ModelConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};

/// Settings of the `phone-agent-api` server.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "phone-agent-api",
    version,
    about = "REST API server for the AutoGLM phone agent"
)]
pub struct ServerSettings {
    /// Address to bind
    #[arg(long, env = "PHONE_AGENT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PHONE_AGENT_PORT", default_value_t = 8765)]
    pub port: u16,

    /// OpenAI-compatible model endpoint
    #[arg(long, env = "PHONE_AGENT_BASE_URL", default_value = "http://localhost:8000/v1")]
    pub base_url: String,

    #[arg(long, env = "PHONE_AGENT_MODEL", default_value = "autoglm-phone-9b")]
    pub model: String,

    #[arg(long, env = "PHONE_AGENT_API_KEY", default_value = "EMPTY", hide_env_values = true)]
    pub apikey: String,

    /// ADB serial of the default device
    #[arg(long, env = "PHONE_AGENT_DEVICE_ID")]
    pub device_id: Option<String>,

    #[arg(long, env = "PHONE_AGENT_LANG", value_enum, default_value_t = Lang::Cn)]
    pub lang: Lang,

    #[arg(long, env = "PHONE_AGENT_MAX_STEPS", default_value_t = 100)]
    pub max_steps: u32,

    #[arg(long, env = "PHONE_AGENT_ADB_PATH", default_value = "adb")]
    pub adb_path: String,

    /// Retries for failed model requests
    #[arg(long, env = "PHONE_AGENT_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Seconds between model retries
    #[arg(long, env = "PHONE_AGENT_RETRY_DELAY", default_value_t = DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay: u64,

    /// Approve taps the model marks as sensitive (payments, privacy prompts)
    #[arg(long, env = "PHONE_AGENT_ALLOW_SENSITIVE")]
    pub allow_sensitive: bool,

    /// Verbose agent output and debug logging
    #[arg(long)]
    pub debug: bool,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "phone_agent_api=debug,tower_http=debug"
        } else {
            "phone_agent_api=info,tower_http=info"
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::default()
            .with_base_url(&self.base_url)
            .with_api_key(&self.apikey)
            .with_model_name(&self.model)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }

    pub fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::default()
            .with_lang(self.lang)
            .with_max_steps(self.max_steps)
            .with_adb_path(&self.adb_path);
        if let Some(device_id) = self.device_id.as_deref().filter(|d| !d.is_empty()) {
            config = config.with_device_id(device_id);
        }
        if !self.debug {
            config = config.quiet();
        }
        config
    }

    pub fn action_handler(&self) -> ActionHandler {
        if self.allow_sensitive {
            ActionHandler::allowing_sensitive()
        } else {
            ActionHandler::default()
        }
    }

    pub fn build_agent(&self) -> PhoneAgent {
        PhoneAgent::new(self.model_config(), self.agent_config(), self.action_handler())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_flags() {
        let settings = ServerSettings::try_parse_from([
            "phone-agent-api",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--base-url",
            "https://api-inference.modelscope.cn/v1",
            "--model",
            "ZhipuAI/AutoGLM-Phone-9B",
            "--apikey",
            "ms-test",
            "--device-id",
            "emulator-5554",
            "--lang",
            "en",
            "--max-steps",
            "20",
            "--allow-sensitive",
            "--debug",
        ])
        .unwrap();

        assert_eq!(settings.bind_addr(), "0.0.0.0:9000");
        assert_eq!(settings.lang, Lang::En);
        assert!(settings.allow_sensitive);
        assert_eq!(settings.log_filter(), "phone_agent_api=debug,tower_http=debug");

        let model = settings.model_config();
        assert_eq!(model.base_url, "https://api-inference.modelscope.cn/v1");
        assert_eq!(model.model_name, "ZhipuAI/AutoGLM-Phone-9B");
        assert_eq!(model.api_key, "ms-test");

        let agent = settings.agent_config();
        assert_eq!(agent.device_id.as_deref(), Some("emulator-5554"));
        assert_eq!(agent.max_steps, 20);
        assert_eq!(agent.lang, Lang::En);
        assert!(agent.verbose);
    }

    #[test]
    fn test_rejects_unknown_lang() {
        assert!(ServerSettings::try_parse_from(["phone-agent-api", "--lang", "fr"]).is_err());
    }

    #[test]
    fn test_agent_config_ignores_empty_device() {
        let mut settings =
            ServerSettings::try_parse_from(["phone-agent-api", "--device-id", "x"]).unwrap();
        settings.device_id = Some(String::new());
        settings.debug = false;
        let agent = settings.agent_config();
        assert_eq!(agent.device_id, None);
        assert!(!agent.verbose);
    }
}
