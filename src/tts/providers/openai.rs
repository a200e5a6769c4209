//! OpenAI TTS provider.
//!
//! Uses the speech endpoint through `async-openai` and writes the returned
//! audio bytes into the configured output directory.

use crate::openai::create_client_with_timeout;
use crate::provider::{self, LoadState};
use crate::tts::{wav_duration_seconds, TtsProvider, TtsResult};
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice};
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const PLACEHOLDER_KEYS: &[&str] = &["your-openai-api-key-here", "YOUR_OPENAI_API_KEY_HERE"];

/// TTS provider backed by OpenAI's speech models.
pub struct OpenAiTtsProvider {
    instance_name: String,
    api_key: String,
    model: String,
    voice: String,
    output_dir: PathBuf,
    timeout_seconds: u64,
    client: Mutex<LoadState<async_openai::Client<OpenAIConfig>>>,
}

impl OpenAiTtsProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        let voice = provider::str_value(config, "voice", "alloy");
        debug!(
            "OpenAI TTS provider '{}' initialized with voice: {}",
            instance_name, voice
        );

        Self {
            instance_name: instance_name.to_string(),
            api_key: provider::str_value(config, "api_key", ""),
            model: provider::str_value(config, "model", "tts-1"),
            voice,
            output_dir: PathBuf::from(provider::str_value(config, "output_dir", "tts_output")),
            timeout_seconds: provider::int_value(config, "timeout_seconds", 300).max(1) as u64,
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

    fn speech_model(&self) -> SpeechModel {
        match self.model.as_str() {
            "tts-1" => SpeechModel::Tts1,
            "tts-1-hd" => SpeechModel::Tts1Hd,
            other => SpeechModel::Other(other.to_string()),
        }
    }

    fn speech_voice(&self) -> Voice {
        match self.voice.to_lowercase().as_str() {
            "alloy" => Voice::Alloy,
            "echo" => Voice::Echo,
            "fable" => Voice::Fable,
            "onyx" => Voice::Onyx,
            "nova" => Voice::Nova,
            "shimmer" => Voice::Shimmer,
            other => {
                warn!("Unknown OpenAI voice '{}', falling back to alloy", other);
                Voice::Alloy
            }
        }
    }
}

#[async_trait]
impl TtsProvider for OpenAiTtsProvider {
    fn provider_name(&self) -> String {
        format!("OpenAI TTS ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        if PLACEHOLDER_KEYS.contains(&self.api_key.as_str()) {
            return false;
        }
        self.api_key.starts_with("sk-")
    }

    async fn synthesize(&self, text: &str, output_filename: &str) -> TtsResult {
        if !self.is_configured() {
            return TtsResult::failure("OpenAI TTS provider is not properly configured");
        }

        if text.trim().is_empty() {
            return TtsResult::failure("Text cannot be empty");
        }

        if let Err(e) = std::fs::create_dir_all(&self.output_dir) {
            return TtsResult::failure(format!(
                "Failed to create output directory '{}': {}",
                self.output_dir.display(),
                e
            ));
        }

        let request = match CreateSpeechRequestArgs::default()
            .input(text)
            .model(self.speech_model())
            .voice(self.speech_voice())
            .response_format(SpeechResponseFormat::Wav)
            .build()
        {
            Ok(request) => request,
            Err(e) => return TtsResult::failure(format!("Failed to build request: {}", e)),
        };

        let client = self.client().await;
        let start = Instant::now();
        debug!("Generating speech via OpenAI voice {}...", self.voice);

        let response = match client.audio().speech(request).await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = start.elapsed();
                error!("OpenAI TTS API error: {}", e);
                return TtsResult::failure(format!("OpenAI TTS API error: {}", e))
                    .with_timing(elapsed);
            }
        };

        let output_path = self.output_dir.join(output_filename);
        if let Err(e) = std::fs::write(&output_path, &response.bytes) {
            return TtsResult::failure(format!(
                "Failed to write audio to {}: {}",
                output_path.display(),
                e
            ))
            .with_timing(start.elapsed());
        }

        let elapsed = start.elapsed();
        let audio_duration = wav_duration_seconds(&output_path);
        info!(
            "Speech generated successfully in {}",
            provider::format_elapsed(elapsed)
        );
        info!("Saved to: {}", output_path.display());

        TtsResult::success(output_path)
            .with_timing(elapsed)
            .with_audio_duration(audio_duration)
            .with_provider_response(Some(json!({
                "model": self.model,
                "voice": self.voice,
            })))
    }

    async fn test_connection(&self) -> TtsResult {
        if !self.is_configured() {
            return TtsResult::failure("OpenAI TTS provider is not properly configured");
        }

        self.synthesize("This is a connection test.", "openai_connection_test.wav")
            .await
    }

    async fn cleanup(&self) {
        let mut state = self.client.lock().await;
        if !state.is_unloaded() {
            *state = LoadState::Unloaded;
            debug!(
                "OpenAI TTS client resources cleaned up for {}",
                self.instance_name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;

    fn with_key(key: &str) -> OpenAiTtsProvider {
        let mut t = toml::Table::new();
        t.insert("api_key".to_string(), toml::Value::String(key.to_string()));
        OpenAiTtsProvider::new("cloud", &t)
    }

    #[test]
    fn test_key_format_gate() {
        assert!(!with_key("").is_configured());
        assert!(!with_key("YOUR_OPENAI_API_KEY_HERE").is_configured());
        assert!(!with_key("abc").is_configured());
        assert!(with_key("sk-proj-abc").is_configured());
    }

    #[test]
    fn test_voice_mapping_falls_back_to_default() {
        let mut t = toml::Table::new();
        t.insert(
            "voice".to_string(),
            toml::Value::String("custom-voice".to_string()),
        );
        let provider = OpenAiTtsProvider::new("cloud", &t);
        assert!(matches!(provider.speech_voice(), Voice::Alloy));

        let mut t = toml::Table::new();
        t.insert("voice".to_string(), toml::Value::String("Nova".to_string()));
        let provider = OpenAiTtsProvider::new("cloud", &t);
        assert!(matches!(provider.speech_voice(), Voice::Nova));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let provider = with_key("sk-proj-abc");
        let result = provider.synthesize("", "out.wav").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_unconfigured_fails_fast() {
        let provider = with_key("bad");
        let result = provider.synthesize("hello", "out.wav").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result
            .error_details
            .unwrap()
            .contains("not properly configured"));
    }
}
