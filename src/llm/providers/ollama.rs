//! Ollama LLM provider.
//!
//! Talks to a local or remote Ollama server over its HTTP API.

use crate::llm::{LlmProvider, LlmResult};
use crate::provider::{self, LoadState};
use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

const PLACEHOLDER_MODELS: &[&str] = &["your-model-name-here", "YOUR_MODEL_NAME_HERE"];

/// LLM provider backed by an Ollama server.
pub struct OllamaProvider {
    instance_name: String,
    base_url: String,
    model: String,
    timeout_seconds: u64,
    temperature: f64,
    num_predict: i64,
    default_system_prompt: String,
    client: Mutex<LoadState<reqwest::Client>>,
}

impl OllamaProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        let base_url = provider::str_value(config, "base_url", "http://localhost:11434");
        let model = provider::str_value(config, "model", "llama2");
        debug!(
            "Ollama provider '{}' initialized with model: {} at {}",
            instance_name, model, base_url
        );

        Self {
            instance_name: instance_name.to_string(),
            base_url,
            model,
            timeout_seconds: provider::int_value(config, "timeout_seconds", 120).max(1) as u64,
            temperature: provider::float_value(config, "temperature", 0.7),
            num_predict: provider::int_value(config, "num_predict", 4000),
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
                let reason = format!("Failed to build the Ollama HTTP client: {}", e);
                *state = LoadState::Failed(reason.clone());
                Err(reason)
            }
        }
    }

    /// Map low-level reqwest failures to actionable messages.
    fn describe_error(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            format!(
                "Request to Ollama server at {} timed out after {}s",
                self.base_url, self.timeout_seconds
            )
        } else if e.is_connect() {
            format!(
                "Cannot connect to Ollama server at {}. Make sure Ollama is running with: ollama serve",
                self.base_url
            )
        } else {
            format!("Ollama request failed: {}", e)
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_name(&self) -> String {
        format!("Ollama ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        if self.base_url.is_empty() || self.model.is_empty() {
            return false;
        }
        !PLACEHOLDER_MODELS.contains(&self.model.as_str())
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("Ollama provider is not properly configured");
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
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user_prompt},
            ],
            "options": {
                "temperature": self.temperature,
                "num_predict": self.num_predict,
            },
            "stream": false,
        });

        let start = Instant::now();
        debug!("Generating response via Ollama API at {}...", self.base_url);

        let response = match client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let msg = self.describe_error(&e);
                error!("{}", msg);
                return LlmResult::failure(msg).with_timing(start.elapsed());
            }
        };

        let elapsed = start.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            let msg = if detail.to_lowercase().contains("not found") {
                format!(
                    "Model '{}' not found. Pull it first with: ollama pull {}",
                    self.model, self.model
                )
            } else {
                format!("Ollama API returned {}: {}", status, detail)
            };
            error!("{}", msg);
            return LlmResult::failure(msg).with_timing(elapsed);
        }

        let payload: serde_json::Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                return LlmResult::failure(format!("Invalid JSON from Ollama: {}", e))
                    .with_timing(elapsed);
            }
        };

        let Some(content) = payload["message"]["content"].as_str() else {
            return LlmResult::failure("Ollama response missing message content")
                .with_timing(elapsed)
                .with_provider_response(Some(payload));
        };

        debug!(
            "Generation completed in {}",
            provider::format_elapsed(elapsed)
        );

        let tokens = payload["eval_count"].as_u64();
        LlmResult::success(content)
            .with_timing(elapsed)
            .with_tokens(tokens)
            .with_provider_response(Some(payload))
    }

    async fn test_connection(&self) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("Ollama provider is not properly configured");
        }

        let client = match self.client().await {
            Ok(client) => client,
            Err(reason) => return LlmResult::failure(reason),
        };

        // Check model availability before burning a generation on it.
        debug!("Checking if model '{}' is available...", self.model);
        let tags = match client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return LlmResult::failure(self.describe_error(&e)),
        };

        let payload: serde_json::Value = match tags.json().await {
            Ok(payload) => payload,
            Err(e) => return LlmResult::failure(format!("Invalid JSON from Ollama: {}", e)),
        };

        let available: Vec<String> = payload["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        if !available.iter().any(|name| name.contains(&self.model)) {
            return LlmResult::failure(format!(
                "Model '{}' is not available. Available models: {}. Pull it with: ollama pull {}",
                self.model,
                available.join(", "),
                self.model
            ));
        }

        let result = self
            .generate(
                "You are a helpful assistant. Respond exactly as requested.",
                "Hello! Please respond with 'Connection test successful.'",
            )
            .await;

        if result.is_success() {
            LlmResult::success(format!(
                "Connection successful. Model: {} at {}",
                self.model, self.base_url
            ))
            .with_provider_response(result.provider_response)
        } else {
            result
        }
    }

    async fn cleanup(&self) {
        let mut state = self.client.lock().await;
        if !state.is_unloaded() {
            *state = LoadState::Unloaded;
            debug!("Ollama client resources cleaned up for {}", self.instance_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;

    fn table(pairs: &[(&str, &str)]) -> toml::Table {
        let mut t = toml::Table::new();
        for (k, v) in pairs {
            t.insert(k.to_string(), toml::Value::String(v.to_string()));
        }
        t
    }

    #[test]
    fn test_configured_with_defaults() {
        // Defaults point at localhost with a real model name.
        let provider = OllamaProvider::new("local", &toml::Table::new());
        assert!(provider.is_configured());
    }

    #[test]
    fn test_placeholder_model_not_configured() {
        let provider =
            OllamaProvider::new("local", &table(&[("model", "your-model-name-here")]));
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_empty_base_url_not_configured() {
        let provider = OllamaProvider::new("local", &table(&[("base_url", "")]));
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let provider = OllamaProvider::new("local", &toml::Table::new());
        let result = provider.generate("", "  ").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
    }
}
