//! Anthropic LLM provider.
//!
//! Talks to the Anthropic Messages API directly over HTTP.

use crate::llm::{LlmProvider, LlmResult};
use crate::provider::{self, LoadState};
use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Claude, a helpful AI assistant created by Anthropic.";

const PLACEHOLDER_KEYS: &[&str] = &["your-anthropic-api-key-here", "YOUR_ANTHROPIC_API_KEY_HERE"];

/// LLM provider backed by Anthropic's Claude models.
pub struct AnthropicProvider {
    instance_name: String,
    api_key: String,
    model: String,
    max_tokens: i64,
    temperature: f64,
    timeout_seconds: u64,
    default_system_prompt: String,
    client: Mutex<LoadState<reqwest::Client>>,
}

impl AnthropicProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        let model = provider::str_value(config, "model", "claude-haiku-4-5");
        debug!(
            "Anthropic provider '{}' initialized with model: {}",
            instance_name, model
        );

        Self {
            instance_name: instance_name.to_string(),
            api_key: provider::str_value(config, "api_key", ""),
            model,
            max_tokens: provider::int_value(config, "max_tokens", 4000),
            temperature: provider::float_value(config, "temperature", 0.7),
            timeout_seconds: provider::int_value(config, "timeout_seconds", 300).max(1) as u64,
            default_system_prompt: provider::str_value(
                config,
                "default_system_prompt",
                DEFAULT_SYSTEM_PROMPT,
            ),
            client: Mutex::new(LoadState::Unloaded),
        }
    }

    async fn client(&self) -> Result<reqwest::Client, String> {
        let mut state = self.client.lock().await;
        match &*state {
            LoadState::Loaded(client) => return Ok(client.clone()),
            LoadState::Failed(reason) => return Err(reason.clone()),
            LoadState::Unloaded => {}
        }

        match reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .build()
        {
            Ok(client) => {
                *state = LoadState::Loaded(client.clone());
                Ok(client)
            }
            Err(e) => {
                let reason = format!("Failed to build the Anthropic HTTP client: {}", e);
                *state = LoadState::Failed(reason.clone());
                Err(reason)
            }
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> String {
        format!("Anthropic ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        if PLACEHOLDER_KEYS.contains(&self.api_key.as_str()) {
            return false;
        }
        // Anthropic keys carry the 'sk-ant-' prefix.
        self.api_key.starts_with("sk-ant-")
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("Anthropic provider is not properly configured");
        }

        if user_prompt.trim().is_empty() {
            return LlmResult::failure("User prompt cannot be empty");
        }

        let client = match self.client().await {
            Ok(client) => client,
            Err(reason) => return LlmResult::failure(reason),
        };

        let system = if system_prompt.trim().is_empty() {
            &self.default_system_prompt
        } else {
            system_prompt
        };

        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system,
            "messages": [
                {"role": "user", "content": user_prompt},
            ],
        });

        let start = Instant::now();
        debug!("Generating response via Anthropic model {}...", self.model);

        let response = match client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let elapsed = start.elapsed();
                let msg = if e.is_timeout() {
                    format!(
                        "Request to Anthropic API timed out after {}s",
                        self.timeout_seconds
                    )
                } else {
                    format!("Anthropic request failed: {}", e)
                };
                error!("{}", msg);
                return LlmResult::failure(msg).with_timing(elapsed);
            }
        };

        let elapsed = start.elapsed();
        let status = response.status();
        let payload: serde_json::Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                return LlmResult::failure(format!("Invalid JSON from Anthropic: {}", e))
                    .with_timing(elapsed);
            }
        };

        if !status.is_success() {
            let detail = payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            error!("Anthropic API returned {}: {}", status, detail);
            return LlmResult::failure(format!("Anthropic API returned {}: {}", status, detail))
                .with_timing(elapsed)
                .with_provider_response(Some(payload));
        }

        let Some(content) = payload["content"][0]["text"].as_str() else {
            return LlmResult::failure("Anthropic response contained no text content")
                .with_timing(elapsed)
                .with_provider_response(Some(payload));
        };

        let tokens = match (
            payload["usage"]["input_tokens"].as_u64(),
            payload["usage"]["output_tokens"].as_u64(),
        ) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        };

        debug!(
            "Generation completed in {}",
            provider::format_elapsed(elapsed)
        );
        LlmResult::success(content)
            .with_timing(elapsed)
            .with_tokens(tokens)
            .with_provider_response(Some(payload))
    }

    async fn test_connection(&self) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("Anthropic provider is not properly configured");
        }

        let result = self
            .generate(
                "You are a helpful assistant. Respond exactly as requested.",
                "Hello! Please respond with 'Connection test successful.'",
            )
            .await;

        if result.is_success() {
            LlmResult::success(format!("Connection successful. Model: {}", self.model))
        } else {
            result
        }
    }

    async fn cleanup(&self) {
        let mut state = self.client.lock().await;
        if !state.is_unloaded() {
            *state = LoadState::Unloaded;
            debug!(
                "Anthropic client resources cleaned up for {}",
                self.instance_name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;

    fn with_key(key: &str) -> AnthropicProvider {
        let mut t = toml::Table::new();
        t.insert("api_key".to_string(), toml::Value::String(key.to_string()));
        AnthropicProvider::new("claude", &t)
    }

    #[test]
    fn test_key_format_gate() {
        assert!(!with_key("").is_configured());
        assert!(!with_key("your-anthropic-api-key-here").is_configured());
        assert!(!with_key("sk-wrong-prefix").is_configured());
        assert!(with_key("sk-ant-api03-abc").is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_fails_fast() {
        let provider = with_key("not-a-key");
        let result = provider.generate("", "hello").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result
            .error_details
            .unwrap()
            .contains("not properly configured"));
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let provider = with_key("sk-ant-api03-abc");
        let result = provider.generate("", "").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
    }
}
