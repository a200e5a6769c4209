//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client for a specific API key with the default timeout.
///
/// Uses a 5-minute timeout to prevent hung API calls.
pub fn create_client(api_key: &str) -> Client<OpenAIConfig> {
    create_client_with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(api_key: &str, timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default();

    Client::with_config(OpenAIConfig::new().with_api_key(api_key)).with_http_client(http_client)
}
