//! phone-agent-probe - manual smoke test
//!
//! Sends a published test conversation to a hosted AutoGLM endpoint, then
//! checks that the local API server answers `/health`.
//! Run with: cargo run --bin phone-agent-probe -- ms-YOUR-TOKEN

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use phone_agent_api::model::{ModelClient, ModelConfig};
use serde_json::Value;

const RULE: &str = "============================================================";

#[derive(Parser, Debug)]
#[command(name = "phone-agent-probe", version, about = "Smoke-test a model endpoint and the local API server")]
struct Args {
    /// API key for the model endpoint
    #[arg(env = "MODELSCOPE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, default_value = "https://api-inference.modelscope.cn/v1")]
    base_url: String,

    #[arg(long, default_value = "ZhipuAI/AutoGLM-Phone-9B")]
    model: String,

    /// JSON array of chat messages to send
    #[arg(
        long,
        default_value = "https://modelscope.oss-cn-beijing.aliyuncs.com/phone_agent_test.json"
    )]
    test_data_url: String,

    /// Base URL of a running phone-agent-api server
    #[arg(long, default_value = "http://127.0.0.1:8765")]
    server: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let Some(api_key) = args.api_key.clone().filter(|k| !k.is_empty()) else {
        eprintln!("❌ Error: API key not provided");
        eprintln!("\nUsage:");
        eprintln!("  phone-agent-probe ms-YOUR-TOKEN");
        eprintln!("  or set MODELSCOPE_API_KEY environment variable");
        std::process::exit(1);
    };

    if let Err(e) = probe_model(&args, &api_key).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }

    probe_server(&args.server).await;
    Ok(())
}

async fn probe_model(args: &Args, api_key: &str) -> anyhow::Result<()> {
    println!("{}", RULE);
    println!("Testing model endpoint");
    println!("{}", RULE);
    println!("API Key: {}", mask_key(api_key));
    println!("Endpoint: {} ({})", args.base_url, args.model);
    println!();

    println!("📥 Fetching test data...");
    let messages: Vec<Value> = reqwest::get(&args.test_data_url)
        .await
        .and_then(|r| r.error_for_status())
        .context("failed to download test data")?
        .json()
        .await
        .context("test data is not a JSON array of messages")?;
    println!("✅ Loaded {} messages", messages.len());
    println!();

    println!("📝 Test messages:");
    for (i, message) in messages.iter().enumerate() {
        let role = message.get("role").and_then(Value::as_str).unwrap_or("unknown");
        println!("  {}. {}: {}", i + 1, role, preview_content(message.get("content")));
    }
    println!();

    println!("🤖 Calling {}...", args.model);
    let config = ModelConfig::default()
        .with_base_url(&args.base_url)
        .with_api_key(api_key)
        .with_model_name(&args.model)
        .with_max_tokens(1024)
        .without_sampling_penalties()
        .without_extra_body();
    let completion = ModelClient::new(config).chat(&messages).await?;
    println!("✅ Model response received");
    println!();

    println!("{}", RULE);
    println!("Model Response:");
    println!("{}", RULE);
    println!("{}", completion.content);
    println!("{}", RULE);
    println!();

    if let Some(usage) = completion.usage {
        println!("📊 Token Usage:");
        println!("  Prompt tokens: {}", usage.prompt_tokens);
        println!("  Completion tokens: {}", usage.completion_tokens);
        println!("  Total tokens: {}", usage.total_tokens);
        println!();
    }

    println!("✅ Test completed successfully!");
    Ok(())
}

async fn probe_server(server: &str) {
    let server = server.trim_end_matches('/');
    println!("\n{}", RULE);
    println!("Testing API server");
    println!("{}", RULE);
    println!("📡 Testing {}/health...", server);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            println!("❌ Error: {}", e);
            return;
        }
    };

    let response = client
        .get(format!("{}/health", server))
        .send()
        .await
        .and_then(|r| r.error_for_status());

    let body: Value = match response {
        Ok(response) => match response.json().await {
            Ok(body) => body,
            Err(e) => {
                println!("❌ Error: {}", e);
                return;
            }
        },
        Err(e) if e.is_connect() || e.is_timeout() => {
            println!("❌ Cannot connect to API server");
            println!("   Make sure the server is running on {}", server);
            println!("\n   Start the server with:");
            println!("   phone-agent-api \\");
            println!("       --base-url https://api-inference.modelscope.cn/v1 \\");
            println!("       --model ZhipuAI/AutoGLM-Phone-9B \\");
            println!("       --apikey ms-YOUR-TOKEN");
            return;
        }
        Err(e) => {
            println!("❌ Error: {}", e);
            return;
        }
    };

    let devices = body
        .get("devices")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    println!("✅ API server is running");
    println!("  Status: {}", body.get("status").unwrap_or(&Value::Null));
    println!(
        "  Agent initialized: {}",
        body.get("agent_initialized").unwrap_or(&Value::Null)
    );
    println!("  Devices: {}", devices.len());
    for device in &devices {
        println!(
            "    - {} ({})",
            device.get("id").and_then(Value::as_str).unwrap_or("?"),
            device.get("status").and_then(Value::as_str).unwrap_or("?")
        );
    }
    println!();
    println!("✅ API server test completed!");
}

/// Show the first and last ten characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 20 {
        return format!("{}...", chars.iter().take(4).collect::<String>());
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 10..].iter().collect();
    format!("{}...{}", head, tail)
}

/// One-line preview of a message's content.
fn preview_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::Array(items)) => format!("[{} items]", items.len()),
        Some(Value::String(text)) => match text.char_indices().nth(100) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.clone(),
        },
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preview_content() {
        assert_eq!(preview_content(Some(&json!("hello"))), "hello");
        assert_eq!(
            preview_content(Some(&json!([{"type": "text"}, {"type": "image_url"}]))),
            "[2 items]"
        );
        let long = "长".repeat(150);
        let preview = preview_content(Some(&json!(long)));
        assert_eq!(preview.chars().count(), 103);
        assert_eq!(preview_content(None), "");
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(
            mask_key("ms-0123456789abcdefghij-XYZ"),
            "ms-0123456...efghij-XYZ"
        );
        assert_eq!(mask_key("short"), "shor...");
    }
}
