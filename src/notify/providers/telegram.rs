//! Telegram notification provider.
//!
//! Sends messages through the Telegram Bot API. When an audio file is
//! attached, the message rides along as the audio caption so both arrive as
//! a single Telegram message.

use crate::notify::{NotificationProvider, NotificationResult};
use crate::provider::{self, LoadState};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const BASE_URL: &str = "https://api.telegram.org/bot";

/// Telegram's upload limit for bot audio files.
const MAX_AUDIO_BYTES: u64 = 50 * 1024 * 1024;

const PLACEHOLDER_TOKEN: &str = "YOUR_BOT_TOKEN_HERE";
const PLACEHOLDER_CHAT_ID: &str = "YOUR_CHAT_ID_HERE";

/// Notification provider backed by a Telegram bot.
pub struct TelegramProvider {
    instance_name: String,
    bot_token: String,
    chat_id: String,
    timeout_seconds: u64,
    retry_attempts: u32,
    client: Mutex<LoadState<reqwest::Client>>,
}

impl TelegramProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        let timeout_seconds = provider::int_value(config, "timeout_seconds", 30).max(1) as u64;
        let retry_attempts = provider::int_value(config, "retry_attempts", 3).max(1) as u32;
        debug!(
            "Telegram provider '{}' initialized with timeout={}, retries={}",
            instance_name, timeout_seconds, retry_attempts
        );

        Self {
            instance_name: instance_name.to_string(),
            bot_token: provider::str_value(config, "bot_token", PLACEHOLDER_TOKEN),
            chat_id: provider::str_value(config, "chat_id", PLACEHOLDER_CHAT_ID),
            timeout_seconds,
            retry_attempts,
            client: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Bot tokens look like `123456:alphanumeric-rest`.
    fn is_valid_token(token: &str) -> bool {
        if token.is_empty() || token == PLACEHOLDER_TOKEN {
            return false;
        }
        let mut parts = token.splitn(2, ':');
        let id = parts.next().unwrap_or("");
        let secret = parts.next().unwrap_or("");
        !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
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
                let reason = format!("Failed to build the Telegram HTTP client: {}", e);
                *state = LoadState::Failed(reason.clone());
                Err(reason)
            }
        }
    }

    fn build_url(&self, method: &str) -> String {
        format!("{}{}/{}", BASE_URL, self.bot_token, method)
    }

    /// Interpret a Telegram API response body.
    fn parse_response(payload: serde_json::Value, success_message: &str) -> NotificationResult {
        if payload["ok"].as_bool().unwrap_or(false) {
            NotificationResult::success(success_message)
                .with_provider_response(payload.get("result").cloned())
        } else {
            let description = payload["description"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string();
            warn!("Telegram API error: {}", description);
            NotificationResult::failure(description).with_provider_response(Some(payload))
        }
    }

    /// POST a JSON payload with retry on timeout/connection errors.
    async fn make_request(&self, method: &str, data: serde_json::Value) -> NotificationResult {
        let client = match self.client().await {
            Ok(client) => client,
            Err(reason) => return NotificationResult::failure(reason),
        };

        let url = self.build_url(method);

        for attempt in 1..=self.retry_attempts {
            debug!("Making request to {} (attempt {})", method, attempt);

            match client.post(&url).json(&data).send().await {
                Ok(response) => {
                    return match response.json::<serde_json::Value>().await {
                        Ok(payload) => {
                            Self::parse_response(payload, "Message sent successfully")
                        }
                        Err(_) => NotificationResult::failure(
                            "Invalid JSON response from Telegram API",
                        ),
                    };
                }
                Err(e) if e.is_timeout() => {
                    warn!("Request timeout (attempt {})", attempt);
                    if attempt == self.retry_attempts {
                        return NotificationResult::failure(
                            "Request timeout after all retry attempts",
                        );
                    }
                }
                Err(e) if e.is_connect() => {
                    warn!("Connection error (attempt {})", attempt);
                    if attempt == self.retry_attempts {
                        return NotificationResult::failure(
                            "Connection error after all retry attempts",
                        );
                    }
                }
                Err(e) => {
                    error!("Unexpected error: {}", e);
                    return NotificationResult::failure(format!("Unexpected error: {}", e));
                }
            }
        }

        NotificationResult::failure("All retry attempts failed")
    }

    async fn send_text_message(&self, message: &str) -> NotificationResult {
        if message.trim().is_empty() {
            return NotificationResult::failure("Message text cannot be empty");
        }

        let data = json!({
            "chat_id": self.chat_id,
            "text": message,
        });

        self.make_request("sendMessage", data).await
    }

    /// Send an audio file with the message as its caption.
    async fn send_audio_file(&self, message: &str, file_path: &Path) -> NotificationResult {
        if !file_path.exists() {
            return NotificationResult::failure(format!(
                "Audio file not found: {}",
                file_path.display()
            ));
        }

        let file_size = match std::fs::metadata(file_path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                return NotificationResult::failure(format!(
                    "Cannot read audio file {}: {}",
                    file_path.display(),
                    e
                ));
            }
        };
        if file_size > MAX_AUDIO_BYTES {
            return NotificationResult::failure(format!(
                "File too large: {:.1}MB (max 50MB)",
                file_size as f64 / 1024.0 / 1024.0
            ));
        }

        let client = match self.client().await {
            Ok(client) => client,
            Err(reason) => return NotificationResult::failure(reason),
        };

        let bytes = match tokio::fs::read(file_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return NotificationResult::failure(format!(
                    "Failed to read audio file {}: {}",
                    file_path.display(),
                    e
                ));
            }
        };

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("summary.wav")
            .to_string();
        let url = self.build_url("sendAudio");

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Sending audio file (attempt {}): {}",
                attempt,
                file_path.display()
            );

            let part = match reqwest::multipart::Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str("audio/wav")
            {
                Ok(part) => part,
                Err(e) => {
                    return NotificationResult::failure(format!(
                        "Failed to build multipart body: {}",
                        e
                    ));
                }
            };

            let form = reqwest::multipart::Form::new()
                .text("chat_id", self.chat_id.clone())
                .text("caption", message.to_string())
                .part("audio", part);

            match client.post(&url).multipart(form).send().await {
                Ok(response) => match response.json::<serde_json::Value>().await {
                    Ok(payload) => {
                        let result = Self::parse_response(payload, "Audio sent successfully");
                        if result.is_success() || attempt == self.retry_attempts {
                            return result;
                        }
                    }
                    Err(_) => {
                        if attempt == self.retry_attempts {
                            return NotificationResult::failure(
                                "Invalid JSON response from Telegram API",
                            );
                        }
                    }
                },
                Err(e) if e.is_timeout() => {
                    warn!("Request timeout (attempt {})", attempt);
                    if attempt == self.retry_attempts {
                        return NotificationResult::failure(
                            "Request timeout after all retry attempts",
                        );
                    }
                }
                Err(e) if e.is_connect() => {
                    warn!("Connection error (attempt {})", attempt);
                    if attempt == self.retry_attempts {
                        return NotificationResult::failure(
                            "Connection error after all retry attempts",
                        );
                    }
                }
                Err(e) => {
                    error!("Unexpected error: {}", e);
                    return NotificationResult::failure(format!("Unexpected error: {}", e));
                }
            }
        }

        NotificationResult::failure("All retry attempts failed")
    }
}

#[async_trait]
impl NotificationProvider for TelegramProvider {
    fn provider_name(&self) -> String {
        format!("Telegram ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        if self.chat_id.is_empty() || self.chat_id == PLACEHOLDER_CHAT_ID {
            return false;
        }
        Self::is_valid_token(&self.bot_token)
    }

    async fn send(&self, message: &str, audio_file: Option<&Path>) -> NotificationResult {
        if !self.is_configured() {
            return NotificationResult::failure("Telegram provider is not properly configured");
        }

        match audio_file {
            Some(path) => self.send_audio_file(message, path).await,
            None => self.send_text_message(message).await,
        }
    }

    async fn test_connection(&self) -> NotificationResult {
        if !self.is_configured() {
            return NotificationResult::failure("Telegram provider is not properly configured");
        }

        let result = self.make_request("getMe", json!({})).await;

        if result.is_success() {
            let bot_name = result
                .provider_response
                .as_ref()
                .and_then(|r| r["username"].as_str())
                .unwrap_or("Unknown")
                .to_string();
            NotificationResult::success(format!("Connection successful. Bot: @{}", bot_name))
                .with_provider_response(result.provider_response)
        } else {
            result
        }
    }

    async fn cleanup(&self) {
        let mut state = self.client.lock().await;
        if !state.is_unloaded() {
            *state = LoadState::Unloaded;
            debug!(
                "Telegram client resources cleaned up for {}",
                self.instance_name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;

    fn with_credentials(token: &str, chat_id: &str) -> TelegramProvider {
        let mut t = toml::Table::new();
        t.insert(
            "bot_token".to_string(),
            toml::Value::String(token.to_string()),
        );
        t.insert(
            "chat_id".to_string(),
            toml::Value::String(chat_id.to_string()),
        );
        TelegramProvider::new("personal", &t)
    }

    #[test]
    fn test_token_format_validation() {
        assert!(TelegramProvider::is_valid_token("123456:AAF-abc_def"));
        assert!(!TelegramProvider::is_valid_token(""));
        assert!(!TelegramProvider::is_valid_token("YOUR_BOT_TOKEN_HERE"));
        assert!(!TelegramProvider::is_valid_token("no-colon-here"));
        assert!(!TelegramProvider::is_valid_token("abc:def"));
        assert!(!TelegramProvider::is_valid_token("123456:"));
    }

    #[test]
    fn test_is_configured_gates() {
        assert!(!TelegramProvider::new("personal", &toml::Table::new()).is_configured());
        assert!(!with_credentials("123456:AAF-abc", "YOUR_CHAT_ID_HERE").is_configured());
        assert!(!with_credentials("YOUR_BOT_TOKEN_HERE", "42").is_configured());
        assert!(with_credentials("123456:AAF-abc", "42").is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_send_fails_fast() {
        let provider = TelegramProvider::new("personal", &toml::Table::new());
        let result = provider.send("hello", None).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result
            .error_details
            .unwrap()
            .contains("not properly configured"));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let provider = with_credentials("123456:AAF-abc", "42");
        let result = provider.send("   ", None).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_missing_audio_file_rejected() {
        let provider = with_credentials("123456:AAF-abc", "42");
        let result = provider
            .send("hello", Some(Path::new("/nonexistent/summary.wav")))
            .await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("not found"));
    }

    #[test]
    fn test_parse_response_shapes() {
        let ok = TelegramProvider::parse_response(
            serde_json::json!({"ok": true, "result": {"message_id": 7}}),
            "sent",
        );
        assert!(ok.is_success());

        let err = TelegramProvider::parse_response(
            serde_json::json!({"ok": false, "description": "chat not found"}),
            "sent",
        );
        assert_eq!(err.status, ProviderStatus::Failed);
        assert_eq!(err.error_details.as_deref(), Some("chat not found"));
    }
}
