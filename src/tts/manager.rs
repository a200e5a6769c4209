//! Registry and dispatch for TTS provider instances.

use super::providers::{OpenAiTtsProvider, PiperProvider};
use super::{TtsProvider, TtsResult};
use crate::provider::{InstanceStatus, ProviderInstanceConfig};
use tracing::{debug, error, info, warn};

type TtsCtor = fn(&str, &toml::Table) -> Box<dyn TtsProvider>;

/// Known provider types, dispatched by the `type` field of an instance config.
fn provider_registry() -> &'static [(&'static str, TtsCtor)] {
    &[
        ("piper", |name, config| {
            Box::new(PiperProvider::new(name, config))
        }),
        ("openai", |name, config| {
            Box::new(OpenAiTtsProvider::new(name, config))
        }),
    ]
}

struct RegisteredInstance {
    name: String,
    kind: String,
    configured_at_init: bool,
    provider: Box<dyn TtsProvider>,
}

/// High-level TTS manager owning all configured provider instances.
#[derive(Default)]
pub struct TtsManager {
    instances: Vec<RegisteredInstance>,
}

impl TtsManager {
    /// Create an empty manager with no instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from provider instance configurations.
    pub fn from_configs(configs: &[ProviderInstanceConfig]) -> Self {
        let mut manager = Self::new();

        for instance in configs {
            if instance.name.is_empty() {
                warn!("TTS provider instance missing name, skipping");
                continue;
            }
            if !instance.enabled {
                debug!("Skipping disabled TTS provider instance: {}", instance.name);
                continue;
            }

            let kind = instance.kind.to_lowercase();
            let Some((_, ctor)) = provider_registry().iter().find(|(k, _)| *k == kind) else {
                warn!(
                    "Unknown TTS provider type: {} for instance: {}",
                    instance.kind, instance.name
                );
                continue;
            };

            let provider = ctor(&instance.name, &instance.config);
            manager.register(&instance.name, &kind, provider);
        }

        manager
    }

    /// Register a provider instance under a name; first registration wins.
    pub fn register(&mut self, name: &str, kind: &str, provider: Box<dyn TtsProvider>) {
        if self.instances.iter().any(|i| i.name == name) {
            error!("Duplicate TTS provider instance name: {}", name);
            return;
        }

        let configured = provider.is_configured();
        if configured {
            info!("TTS provider '{}' ({}) initialized and configured", name, kind);
        } else {
            info!("TTS provider '{}' ({}) initialized but not configured", name, kind);
        }

        self.instances.push(RegisteredInstance {
            name: name.to_string(),
            kind: kind.to_string(),
            configured_at_init: configured,
            provider,
        });
    }

    /// Names of instances that are currently configured, in registration order.
    pub fn available_instances(&self) -> Vec<String> {
        self.instances
            .iter()
            .filter(|i| i.provider.is_configured())
            .map(|i| i.name.clone())
            .collect()
    }

    /// Whether at least one instance is configured.
    pub fn any_configured(&self) -> bool {
        self.instances.iter().any(|i| i.provider.is_configured())
    }

    fn instance(&self, name: &str) -> Option<&RegisteredInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    /// Synthesize speech via a named instance, or auto-select the first
    /// configured one when no name is given.
    pub async fn generate_speech(
        &self,
        text: &str,
        output_filename: &str,
        instance_name: Option<&str>,
    ) -> TtsResult {
        if text.trim().is_empty() {
            return TtsResult::failure("Text cannot be empty");
        }

        let selected = match instance_name {
            Some(name) => name.to_string(),
            None => {
                let Some(first) = self
                    .instances
                    .iter()
                    .find(|i| i.provider.is_configured())
                    .map(|i| i.name.clone())
                else {
                    return TtsResult::failure("No TTS provider instances are configured");
                };
                debug!("Auto-selected TTS provider instance: {}", first);
                first
            }
        };

        let Some(instance) = self.instance(&selected) else {
            return TtsResult::failure(format!(
                "TTS provider instance '{}' is not available",
                selected
            ));
        };

        if !instance.provider.is_configured() {
            return TtsResult::failure(format!(
                "TTS provider instance '{}' is not properly configured",
                selected
            ));
        }

        info!("Generating speech via {}", instance.provider.provider_name());
        let result = instance.provider.synthesize(text, output_filename).await;

        if result.is_success() {
            info!(
                "Speech generated successfully via {}",
                instance.provider.provider_name()
            );
        } else {
            error!(
                "Failed to generate speech via {}: {}",
                instance.provider.provider_name(),
                result.error_details.as_deref().unwrap_or("unknown error")
            );
        }

        result
    }

    /// Test one instance, or all when no name is given.
    pub async fn test_providers(&self, instance_name: Option<&str>) -> Vec<(String, TtsResult)> {
        let names: Vec<String> = match instance_name {
            Some(name) => vec![name.to_string()],
            None => self.instances.iter().map(|i| i.name.clone()).collect(),
        };

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let Some(instance) = self.instance(&name) else {
                results.push((
                    name.clone(),
                    TtsResult::failure(format!("TTS provider instance '{}' not found", name)),
                ));
                continue;
            };

            info!("Testing {} provider...", instance.provider.provider_name());
            let result = if instance.provider.is_configured() {
                instance.provider.test_connection().await
            } else {
                TtsResult::failure(format!(
                    "{} provider is not configured",
                    instance.provider.provider_name()
                ))
            };
            results.push((name, result));
        }

        results
    }

    /// Live status of every instance.
    pub fn get_provider_status(&self) -> Vec<InstanceStatus> {
        self.instances
            .iter()
            .map(|i| {
                let configured = i.provider.is_configured();
                InstanceStatus {
                    name: i.name.clone(),
                    provider_name: i.provider.provider_name(),
                    kind: i.kind.clone(),
                    configured,
                    available: configured,
                }
            })
            .collect()
    }

    /// Whether the instance was configured when it was registered.
    pub fn configured_at_init(&self, name: &str) -> Option<bool> {
        self.instance(name).map(|i| i.configured_at_init)
    }

    /// Release every instance's backend resources.
    pub async fn cleanup_all(&self) {
        for instance in &self.instances {
            instance.provider.cleanup().await;
        }
        info!("All TTS provider resources cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;
    use async_trait::async_trait;

    struct StubTts {
        name: String,
        configured: bool,
    }

    impl StubTts {
        fn boxed(name: &str, configured: bool) -> Box<dyn TtsProvider> {
            Box::new(Self {
                name: name.to_string(),
                configured,
            })
        }
    }

    #[async_trait]
    impl TtsProvider for StubTts {
        fn provider_name(&self) -> String {
            format!("Stub ({})", self.name)
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn synthesize(&self, _text: &str, output_filename: &str) -> TtsResult {
            TtsResult::success(format!("/out/{}/{}", self.name, output_filename))
        }

        async fn test_connection(&self) -> TtsResult {
            TtsResult::success("/out/test.wav")
        }

        async fn cleanup(&self) {}
    }

    #[tokio::test]
    async fn test_auto_selection_order() {
        let mut manager = TtsManager::new();
        manager.register("a", "stub", StubTts::boxed("a", false));
        manager.register("b", "stub", StubTts::boxed("b", true));

        let result = manager.generate_speech("hello", "out.wav", None).await;
        assert!(result
            .output_file
            .unwrap()
            .to_string_lossy()
            .contains("/out/b/"));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let mut manager = TtsManager::new();
        manager.register("a", "stub", StubTts::boxed("a", true));

        let result = manager.generate_speech("  ", "out.wav", None).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_unknown_instance() {
        let manager = TtsManager::new();
        let result = manager.generate_speech("hi", "out.wav", Some("ghost")).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_ignored() {
        let mut manager = TtsManager::new();
        manager.register("dup", "stub", StubTts::boxed("first", true));
        manager.register("dup", "stub", StubTts::boxed("second", true));

        let result = manager.generate_speech("hi", "out.wav", Some("dup")).await;
        assert!(result
            .output_file
            .unwrap()
            .to_string_lossy()
            .contains("/out/first/"));
    }
}
