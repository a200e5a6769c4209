//! LlamaCpp LLM provider.
//!
//! Runs a local GGUF model through the `llama-cli` binary from llama.cpp.
//! The binary path is resolved lazily on first use; the model path is part
//! of the static configuration.

use crate::llm::{LlmProvider, LlmResult};
use crate::provider::{self, LoadState};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, harmless, and honest AI assistant.";

/// LLM provider backed by a local GGUF model and the llama.cpp CLI.
pub struct LlamaCppProvider {
    instance_name: String,
    model_path: String,
    binary: String,
    context_size: i64,
    gpu_layers: i64,
    max_tokens: i64,
    temperature: f64,
    default_system_prompt: String,
    /// Resolved binary path; resolution failures are cached.
    backend: Mutex<LoadState<PathBuf>>,
}

impl LlamaCppProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        let model_path = provider::str_value(config, "model_path", "");
        debug!(
            "LlamaCpp provider '{}' initialized with model: {}",
            instance_name, model_path
        );

        Self {
            instance_name: instance_name.to_string(),
            model_path,
            binary: provider::str_value(config, "binary", "llama-cli"),
            context_size: provider::int_value(config, "context_size", 4096),
            gpu_layers: provider::int_value(config, "gpu_layers", 0),
            max_tokens: provider::int_value(config, "max_tokens", 4000),
            temperature: provider::float_value(config, "temperature", 0.7),
            default_system_prompt: provider::str_value(
                config,
                "default_system_prompt",
                DEFAULT_SYSTEM_PROMPT,
            ),
            backend: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Resolve the llama.cpp binary, caching the outcome.
    async fn resolve_binary(&self) -> Result<PathBuf, String> {
        let mut state = self.backend.lock().await;
        match &*state {
            LoadState::Loaded(path) => return Ok(path.clone()),
            LoadState::Failed(reason) => return Err(reason.clone()),
            LoadState::Unloaded => {}
        }

        match which::which(&self.binary) {
            Ok(path) => {
                info!("Resolved llama.cpp binary: {}", path.display());
                *state = LoadState::Loaded(path.clone());
                Ok(path)
            }
            Err(e) => {
                let reason = format!(
                    "llama.cpp binary '{}' not found: {}. Install llama.cpp and ensure it's in your PATH.",
                    self.binary, e
                );
                error!("{}", reason);
                *state = LoadState::Failed(reason.clone());
                Err(reason)
            }
        }
    }

    fn build_prompt(&self, system_prompt: &str, user_prompt: &str) -> String {
        let system = if system_prompt.trim().is_empty() {
            &self.default_system_prompt
        } else {
            system_prompt
        };
        format!("<|system|>\n{}\n<|user|>\n{}\n<|assistant|>\n", system, user_prompt)
    }

    #[cfg(test)]
    pub(crate) async fn backend_is_unloaded(&self) -> bool {
        self.backend.lock().await.is_unloaded()
    }
}

#[async_trait]
impl LlmProvider for LlamaCppProvider {
    fn provider_name(&self) -> String {
        format!("LlamaCpp ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        if self.model_path.is_empty() {
            return false;
        }

        let path = Path::new(&self.model_path);
        if !path.exists() {
            return false;
        }

        // GGUF is the only model format llama.cpp loads here.
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gguf"))
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("LlamaCpp provider is not properly configured");
        }

        if user_prompt.trim().is_empty() {
            return LlmResult::failure("User prompt cannot be empty");
        }

        let binary = match self.resolve_binary().await {
            Ok(path) => path,
            Err(reason) => return LlmResult::failure(reason),
        };

        let prompt = self.build_prompt(system_prompt, user_prompt);
        let start = Instant::now();

        debug!("Generating response via {}", binary.display());
        let output = tokio::process::Command::new(&binary)
            .args([
                "-m",
                &self.model_path,
                "-p",
                &prompt,
                "-n",
                &self.max_tokens.to_string(),
                "-c",
                &self.context_size.to_string(),
                "-ngl",
                &self.gpu_layers.to_string(),
                "--temp",
                &self.temperature.to_string(),
                "--no-display-prompt",
                "-no-cnv",
            ])
            .stdin(Stdio::null())
            .output()
            .await;

        let elapsed = start.elapsed();

        let output = match output {
            Ok(out) => out,
            Err(e) => {
                error!("Failed to run llama.cpp: {}", e);
                return LlmResult::failure(format!("Failed to run llama.cpp: {}", e))
                    .with_timing(elapsed);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
            error!("llama.cpp exited with {}: {}", output.status, tail);
            return LlmResult::failure(format!(
                "llama.cpp exited with {}: {}",
                output.status, tail
            ))
            .with_timing(elapsed);
        }

        let generated = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if generated.is_empty() {
            return LlmResult::failure("llama.cpp produced no output").with_timing(elapsed);
        }

        debug!(
            "Generation completed in {}",
            provider::format_elapsed(elapsed)
        );
        LlmResult::success(generated).with_timing(elapsed)
    }

    async fn test_connection(&self) -> LlmResult {
        if !self.is_configured() {
            return LlmResult::failure("LlamaCpp provider is not properly configured");
        }

        let result = self
            .generate(
                "You are a helpful assistant. Respond exactly as requested.",
                "Hello! Please respond with 'Connection test successful.'",
            )
            .await;

        if result.is_success() {
            LlmResult::success(format!("Connection successful. Model: {}", self.model_path))
        } else {
            result
        }
    }

    async fn cleanup(&self) {
        let mut state = self.backend.lock().await;
        if !state.is_unloaded() {
            *state = LoadState::Unloaded;
            debug!(
                "LlamaCpp backend state reset for {}",
                self.instance_name
            );
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
    fn test_not_configured_without_model_path() {
        let provider = LlamaCppProvider::new("local", &toml::Table::new());
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_not_configured_when_model_missing() {
        let provider = LlamaCppProvider::new(
            "local",
            &table(&[("model_path", "/nonexistent/model.gguf")]),
        );
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_configured_requires_gguf_extension() {
        let dir = tempfile::tempdir().unwrap();

        let bad = dir.path().join("model.bin");
        std::fs::File::create(&bad).unwrap().write_all(b"x").unwrap();
        let provider =
            LlamaCppProvider::new("local", &table(&[("model_path", bad.to_str().unwrap())]));
        assert!(!provider.is_configured());

        let good = dir.path().join("model.gguf");
        std::fs::File::create(&good).unwrap().write_all(b"x").unwrap();
        let provider =
            LlamaCppProvider::new("local", &table(&[("model_path", good.to_str().unwrap())]));
        assert!(provider.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_generate_fails_fast_without_lazy_load() {
        let provider = LlamaCppProvider::new("local", &toml::Table::new());

        let result = provider.generate("", "hello").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        // The binary must not have been resolved for an unconfigured instance.
        assert!(provider.backend_is_unloaded().await);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_backend() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.gguf");
        std::fs::File::create(&model).unwrap().write_all(b"x").unwrap();

        let provider =
            LlamaCppProvider::new("local", &table(&[("model_path", model.to_str().unwrap())]));

        let result = provider.generate("", "   ").await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
        assert!(provider.backend_is_unloaded().await);
    }

    #[test]
    fn test_prompt_template_uses_default_system_prompt() {
        let provider = LlamaCppProvider::new("local", &toml::Table::new());
        let prompt = provider.build_prompt("", "hi");
        assert!(prompt.contains(DEFAULT_SYSTEM_PROMPT));

        let prompt = provider.build_prompt("Be terse.", "hi");
        assert!(prompt.contains("Be terse."));
        assert!(!prompt.contains(DEFAULT_SYSTEM_PROMPT));
    }
}
