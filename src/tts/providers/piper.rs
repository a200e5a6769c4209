//! Piper TTS provider.
//!
//! Synthesizes speech with a local ONNX voice through the `piper` binary.
//! Text is piped on stdin and the WAV lands in the configured output
//! directory. The binary path is resolved lazily; the voice model path is
//! part of the static configuration and must come with its sidecar
//! `.onnx.json` config.

use crate::provider::{self, LoadState};
use crate::tts::{wav_duration_seconds, TtsProvider, TtsResult};
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// TTS provider backed by a local Piper voice model.
pub struct PiperProvider {
    instance_name: String,
    model_path: String,
    binary: String,
    output_dir: PathBuf,
    backend: Mutex<LoadState<PathBuf>>,
}

impl PiperProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        let model_path = provider::str_value(config, "model_path", "");
        debug!(
            "Piper provider '{}' initialized with model: {}",
            instance_name, model_path
        );

        Self {
            instance_name: instance_name.to_string(),
            model_path,
            binary: provider::str_value(config, "binary", "piper"),
            output_dir: PathBuf::from(provider::str_value(config, "output_dir", "tts_output")),
            backend: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Resolve the piper binary, caching the outcome.
    async fn resolve_binary(&self) -> Result<PathBuf, String> {
        let mut state = self.backend.lock().await;
        match &*state {
            LoadState::Loaded(path) => return Ok(path.clone()),
            LoadState::Failed(reason) => return Err(reason.clone()),
            LoadState::Unloaded => {}
        }

        match which::which(&self.binary) {
            Ok(path) => {
                info!("Resolved piper binary: {}", path.display());
                *state = LoadState::Loaded(path.clone());
                Ok(path)
            }
            Err(e) => {
                let reason = format!(
                    "piper binary '{}' not found: {}. Install piper-tts and ensure it's in your PATH.",
                    self.binary, e
                );
                error!("{}", reason);
                *state = LoadState::Failed(reason.clone());
                Err(reason)
            }
        }
    }

    fn ensure_output_dir(&self) -> Result<(), String> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            format!(
                "Failed to create output directory '{}': {}",
                self.output_dir.display(),
                e
            )
        })
    }

    #[cfg(test)]
    pub(crate) async fn backend_is_unloaded(&self) -> bool {
        self.backend.lock().await.is_unloaded()
    }
}

#[async_trait]
impl TtsProvider for PiperProvider {
    fn provider_name(&self) -> String {
        format!("Piper ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        if self.model_path.is_empty() {
            return false;
        }

        let model = Path::new(&self.model_path);
        if !model.exists() {
            return false;
        }

        if !model
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("onnx"))
        {
            return false;
        }

        // Piper needs the sidecar voice config next to the model.
        Path::new(&format!("{}.json", self.model_path)).exists()
    }

    async fn synthesize(&self, text: &str, output_filename: &str) -> TtsResult {
        if !self.is_configured() {
            return TtsResult::failure("Piper provider is not properly configured");
        }

        if text.trim().is_empty() {
            return TtsResult::failure("Text cannot be empty");
        }

        if let Err(reason) = self.ensure_output_dir() {
            return TtsResult::failure(reason);
        }

        let binary = match self.resolve_binary().await {
            Ok(path) => path,
            Err(reason) => return TtsResult::failure(reason),
        };

        let output_path = self.output_dir.join(output_filename);
        let start = Instant::now();
        debug!("Generating speech for text: {:.50}...", text);

        let mut child = match tokio::process::Command::new(&binary)
            .args([
                "--model",
                &self.model_path,
                "--output_file",
                &output_path.to_string_lossy(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return TtsResult::failure(format!("Failed to run piper: {}", e))
                    .with_timing(start.elapsed());
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                return TtsResult::failure(format!("Failed to write text to piper: {}", e))
                    .with_timing(start.elapsed());
            }
        }

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => {
                return TtsResult::failure(format!("piper did not finish: {}", e))
                    .with_timing(start.elapsed());
            }
        };

        let elapsed = start.elapsed();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            error!("piper exited with {}: {}", output.status, tail);
            return TtsResult::failure(format!("piper exited with {}: {}", output.status, tail))
                .with_timing(elapsed);
        }

        if !output_path.exists() {
            return TtsResult::failure(format!(
                "piper reported success but produced no file at {}",
                output_path.display()
            ))
            .with_timing(elapsed);
        }

        let audio_duration = wav_duration_seconds(&output_path);
        info!(
            "Speech generated successfully in {}",
            provider::format_elapsed(elapsed)
        );
        if let Some(seconds) = audio_duration {
            info!("Audio duration: {:.2}s", seconds);
        }
        info!("Saved to: {}", output_path.display());

        TtsResult::success(output_path)
            .with_timing(elapsed)
            .with_audio_duration(audio_duration)
            .with_provider_response(Some(json!({ "model_path": self.model_path })))
    }

    async fn test_connection(&self) -> TtsResult {
        if !self.is_configured() {
            return TtsResult::failure("Piper provider is not properly configured");
        }

        let result = self
            .synthesize("This is a connection test.", "piper_connection_test.wav")
            .await;

        if result.is_success() {
            TtsResult {
                status: crate::provider::ProviderStatus::Success,
                ..result
            }
        } else {
            result
        }
    }

    async fn cleanup(&self) {
        let mut state = self.backend.lock().await;
        if !state.is_unloaded() {
            *state = LoadState::Unloaded;
            debug!("Piper backend state reset for {}", self.instance_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;
    use std::io::Write;

    fn table(pairs: &[(&str, &str)]) -> toml::Table {
        let mut t = toml::Table::new();
        for (k, v) in pairs {
            t.insert(k.to_string(), toml::Value::String(v.to_string()));
        }
        t
    }

    #[test]
    fn test_not_configured_without_model() {
        let provider = PiperProvider::new("default", &toml::Table::new());
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_configured_requires_sidecar_config() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("voice.onnx");
        std::fs::File::create(&model).unwrap().write_all(b"x").unwrap();

        let provider = PiperProvider::new(
            "default",
            &table(&[("model_path", model.to_str().unwrap())]),
        );
        // Model exists but the .onnx.json sidecar is missing.
        assert!(!provider.is_configured());

        let sidecar = dir.path().join("voice.onnx.json");
        std::fs::File::create(&sidecar).unwrap().write_all(b"{}").unwrap();
        assert!(provider.is_configured());
    }

    #[test]
    fn test_configured_requires_onnx_extension() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("voice.bin");
        std::fs::File::create(&model).unwrap().write_all(b"x").unwrap();
        std::fs::File::create(dir.path().join("voice.bin.json"))
            .unwrap()
            .write_all(b"{}")
            .unwrap();

        let provider = PiperProvider::new(
            "default",
            &table(&[("model_path", model.to_str().unwrap())]),
        );
        assert!(!provider.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_synthesize_fails_fast_without_lazy_load() {
        let provider = PiperProvider::new("default", &toml::Table::new());
        let result = provider.synthesize("hello", "out.wav").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(provider.backend_is_unloaded().await);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("voice.onnx");
        std::fs::File::create(&model).unwrap().write_all(b"x").unwrap();
        std::fs::File::create(dir.path().join("voice.onnx.json"))
            .unwrap()
            .write_all(b"{}")
            .unwrap();

        let provider = PiperProvider::new(
            "default",
            &table(&[("model_path", model.to_str().unwrap())]),
        );

        let result = provider.synthesize("   ", "out.wav").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
        assert!(provider.backend_is_unloaded().await);
    }
}
