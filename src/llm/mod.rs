//! LLM providers for Hark.
//!
//! Each provider wraps one backend (local GGUF model, Ollama server, OpenAI,
//! Anthropic) behind a uniform interface; the [`LlmManager`] builds named
//! instances from configuration and dispatches to them.

mod manager;
pub mod providers;

pub use manager::LlmManager;

use crate::provider::ProviderStatus;
use async_trait::async_trait;
use std::time::Duration;

/// Result of an LLM generation attempt.
#[derive(Debug, Clone)]
pub struct LlmResult {
    pub status: ProviderStatus,
    pub response: Option<String>,
    pub error_details: Option<String>,
    pub provider_response: Option<serde_json::Value>,
    pub generation_time: Option<Duration>,
    pub token_count: Option<u64>,
}

impl LlmResult {
    /// A successful generation carrying the response text.
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Success,
            response: Some(response.into()),
            error_details: None,
            provider_response: None,
            generation_time: None,
            token_count: None,
        }
    }

    /// A failed generation with a human-readable explanation.
    pub fn failure(error_details: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Failed,
            response: None,
            error_details: Some(error_details.into()),
            provider_response: None,
            generation_time: None,
            token_count: None,
        }
    }

    pub fn with_timing(mut self, elapsed: Duration) -> Self {
        self.generation_time = Some(elapsed);
        self
    }

    pub fn with_tokens(mut self, tokens: Option<u64>) -> Self {
        self.token_count = tokens;
        self
    }

    pub fn with_provider_response(mut self, raw: Option<serde_json::Value>) -> Self {
        self.provider_response = raw;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ProviderStatus::Success
    }
}

/// Contract implemented by every LLM provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name, e.g. "Ollama (local)".
    fn provider_name(&self) -> String;

    /// Whether the instance's static configuration looks usable.
    ///
    /// Must be cheap: no network calls, no model loading.
    fn is_configured(&self) -> bool;

    /// Generate a response. Expected failures are returned as `Failed`
    /// results, never as panics or errors.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> LlmResult;

    /// Exercise the backend with a minimal canned prompt.
    async fn test_connection(&self) -> LlmResult;

    /// Release lazily-held backend resources. Safe to call repeatedly.
    async fn cleanup(&self);
}
