//! Text-to-speech providers for Hark.
//!
//! Providers turn summary text into audio files; the [`TtsManager`] builds
//! named instances from configuration and dispatches to them.

mod manager;
pub mod providers;

pub use manager::TtsManager;

use crate::provider::ProviderStatus;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Result of a TTS synthesis attempt.
#[derive(Debug, Clone)]
pub struct TtsResult {
    pub status: ProviderStatus,
    pub output_file: Option<PathBuf>,
    pub error_details: Option<String>,
    pub generation_time: Option<Duration>,
    /// Duration of the synthesized audio in seconds, when measurable.
    pub audio_duration: Option<f64>,
    pub provider_response: Option<serde_json::Value>,
}

impl TtsResult {
    /// A successful synthesis pointing at the written audio file.
    pub fn success(output_file: impl Into<PathBuf>) -> Self {
        Self {
            status: ProviderStatus::Success,
            output_file: Some(output_file.into()),
            error_details: None,
            generation_time: None,
            audio_duration: None,
            provider_response: None,
        }
    }

    /// A failed synthesis with a human-readable explanation.
    pub fn failure(error_details: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Failed,
            output_file: None,
            error_details: Some(error_details.into()),
            generation_time: None,
            audio_duration: None,
            provider_response: None,
        }
    }

    pub fn with_timing(mut self, elapsed: Duration) -> Self {
        self.generation_time = Some(elapsed);
        self
    }

    pub fn with_audio_duration(mut self, seconds: Option<f64>) -> Self {
        self.audio_duration = seconds;
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

/// Contract implemented by every TTS provider.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Human-readable provider name, e.g. "Piper (default)".
    fn provider_name(&self) -> String;

    /// Whether the instance's static configuration looks usable.
    ///
    /// Must be cheap: no network calls, no model loading.
    fn is_configured(&self) -> bool;

    /// Synthesize `text` into the provider's output directory under
    /// `output_filename`. Expected failures are returned as `Failed`
    /// results, never as panics or errors.
    async fn synthesize(&self, text: &str, output_filename: &str) -> TtsResult;

    /// Exercise the backend with a short canned phrase.
    async fn test_connection(&self) -> TtsResult;

    /// Release lazily-held backend resources. Safe to call repeatedly.
    async fn cleanup(&self);
}

/// Read the duration of a WAV file, when the header is parseable.
pub(crate) fn wav_duration_seconds(path: &std::path::Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}
