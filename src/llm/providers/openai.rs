//! OpenAI LLM provider.
//!
//! Uses the chat completions API through `async-openai`.

use crate::llm::{LlmProvider, LlmResult};
use crate::openai::create_client_with_timeout;
use crate::provider::{self, LoadState};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

const PLACEHOLDER_KEYS: &[&str] = &["your-openai-api-key-here", "YOUR_OPENAI_API_KEY_HERE"];

/// LLM provider backed by OpenAI chat models.
pub struct OpenAiProvider {
    instance_name: String,
    api_key: String,
    model: String,
    max_tokens: i64,
    temperature: f64,
    timeout_seconds: u64,
    default_system_prompt: String,
    client: Mutex<LoadState<async_openai::Client<OpenAIConfig>>>,
}

impl OpenAiProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        let model = provider::str_value(config, "model", "gpt-4o-mini");
        debug!(
            "OpenAI provider '{}' initialized with model: {}",
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

    async fn client(&self) -> async_openai::Client<OpenAIConfig> {
        let mut state = self.client.lock().await;
        if let LoadState::Loaded(client) = &*state {
            return client.clone();
        }

        let client = create_client_with_timeout(
            &self.api_key,
            Duration::from_secs(self.timeout_seconds),
        );
        *state = LoadState::Loaded(client.clone());
        client
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> String {
        format!("OpenAI ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        if PLACEHOLDER_KEYS.contains(&self.api_key.as_str()) {
            return false;
        }
        // Cheap sanity gate on the key shape, not full validation.
        self.api_key.starts_with("sk-")
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("OpenAI provider is not properly configured");
        }

        if user_prompt.trim().is_empty() {
            return LlmResult::failure("User prompt cannot be empty");
        }

        let system = if system_prompt.trim().is_empty() {
            &self.default_system_prompt
        } else {
            system_prompt
        };

        let system_message = match ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
        {
            Ok(message) => message,
            Err(e) => return LlmResult::failure(format!("Failed to build request: {}", e)),
        };

        let user_message = match ChatCompletionRequestUserMessageArgs::default()
            .content(user_prompt)
            .build()
        {
            Ok(message) => message,
            Err(e) => return LlmResult::failure(format!("Failed to build request: {}", e)),
        };

        let request = match CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([system_message.into(), user_message.into()])
            .max_tokens(self.max_tokens.clamp(1, u32::MAX as i64) as u32)
            .temperature(self.temperature as f32)
            .build()
        {
            Ok(request) => request,
            Err(e) => return LlmResult::failure(format!("Failed to build request: {}", e)),
        };

        let client = self.client().await;
        let start = Instant::now();
        debug!("Generating response via OpenAI model {}...", self.model);

        let response = match client.chat().create(request).await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = start.elapsed();
                error!("OpenAI API error: {}", e);
                return LlmResult::failure(format!("OpenAI API error: {}", e))
                    .with_timing(elapsed);
            }
        };

        let elapsed = start.elapsed();
        let tokens = response.usage.as_ref().map(|u| u.total_tokens as u64);
        let raw = serde_json::to_value(&response).ok();

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone());

        let Some(content) = content else {
            return LlmResult::failure("OpenAI response contained no message content")
                .with_timing(elapsed)
                .with_provider_response(raw);
        };

        debug!(
            "Generation completed in {}",
            provider::format_elapsed(elapsed)
        );
        LlmResult::success(content)
            .with_timing(elapsed)
            .with_tokens(tokens)
            .with_provider_response(raw)
    }

    async fn test_connection(&self) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("OpenAI provider is not properly configured");
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
            debug!("OpenAI client resources cleaned up for {}", self.instance_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;

    fn with_key(key: &str) -> OpenAiProvider {
        let mut t = toml::Table::new();
        t.insert("api_key".to_string(), toml::Value::String(key.to_string()));
        OpenAiProvider::new("cloud", &t)
    }

    #[test]
    fn test_key_format_gate() {
        assert!(!with_key("").is_configured());
        assert!(!with_key("your-openai-api-key-here").is_configured());
        assert!(!with_key("not-a-key").is_configured());
        assert!(with_key("sk-proj-abc123").is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_fails_fast() {
        let provider = with_key("");
        let result = provider.generate("", "hello").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result
            .error_details
            .unwrap()
            .contains("not properly configured"));
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let provider = with_key("sk-proj-abc123");
        let result = provider.generate("", "\t ").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
    }
}
