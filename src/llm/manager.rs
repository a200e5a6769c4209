//! Registry and dispatch for LLM provider instances.

use super::providers::{
    AnthropicProvider, LlamaCppProvider, OllamaProvider, OpenAiProvider,
};
use super::{LlmProvider, LlmResult};
use crate::provider::{InstanceStatus, ProviderInstanceConfig};
use tracing::{debug, error, info, warn};

type LlmCtor = fn(&str, &toml::Table) -> Box<dyn LlmProvider>;

/// Known provider types, dispatched by the `type` field of an instance
/// config. Adding a provider type is a one-line registration here.
fn provider_registry() -> &'static [(&'static str, LlmCtor)] {
    &[
        ("llamacpp", |name, config| {
            Box::new(LlamaCppProvider::new(name, config))
        }),
        ("ollama", |name, config| {
            Box::new(OllamaProvider::new(name, config))
        }),
        ("openai", |name, config| {
            Box::new(OpenAiProvider::new(name, config))
        }),
        ("anthropic", |name, config| {
            Box::new(AnthropicProvider::new(name, config))
        }),
    ]
}

struct RegisteredInstance {
    name: String,
    kind: String,
    /// Snapshot taken at registration; `get_provider_status` recomputes live.
    configured_at_init: bool,
    provider: Box<dyn LlmProvider>,
}

/// High-level LLM manager owning all configured provider instances.
///
/// Instances are kept in registration order; auto-selection picks the first
/// instance that is currently configured.
#[derive(Default)]
pub struct LlmManager {
    instances: Vec<RegisteredInstance>,
}

impl LlmManager {
    /// Create an empty manager with no instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from provider instance configurations.
    ///
    /// Disabled, unnamed, unknown-type, and duplicate-name entries are
    /// skipped with a log line; construction itself never fails.
    pub fn from_configs(configs: &[ProviderInstanceConfig]) -> Self {
        let mut manager = Self::new();

        for instance in configs {
            if instance.name.is_empty() {
                warn!("LLM provider instance missing name, skipping");
                continue;
            }
            if !instance.enabled {
                debug!("Skipping disabled LLM provider instance: {}", instance.name);
                continue;
            }

            let kind = instance.kind.to_lowercase();
            let Some((_, ctor)) = provider_registry().iter().find(|(k, _)| *k == kind) else {
                warn!(
                    "Unknown LLM provider type: {} for instance: {}",
                    instance.kind, instance.name
                );
                continue;
            };

            let provider = ctor(&instance.name, &instance.config);
            manager.register(&instance.name, &kind, provider);
        }

        manager
    }

    /// Register a provider instance under a name.
    ///
    /// Duplicate names are rejected; the first registration wins.
    pub fn register(&mut self, name: &str, kind: &str, provider: Box<dyn LlmProvider>) {
        if self.instances.iter().any(|i| i.name == name) {
            error!("Duplicate LLM provider instance name: {}", name);
            return;
        }

        let configured = provider.is_configured();
        if configured {
            info!("LLM provider '{}' ({}) initialized and configured", name, kind);
        } else {
            info!("LLM provider '{}' ({}) initialized but not configured", name, kind);
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

    /// Generate a response via a named instance, or auto-select the first
    /// configured one when no name is given.
    pub async fn generate_response(
        &self,
        user_prompt: &str,
        instance_name: Option<&str>,
        system_prompt: Option<&str>,
    ) -> LlmResult {
        if user_prompt.trim().is_empty() {
            return LlmResult::failure("User prompt cannot be empty");
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
                    return LlmResult::failure("No LLM provider instances are configured");
                };
                debug!("Auto-selected LLM provider instance: {}", first);
                first
            }
        };

        let Some(instance) = self.instance(&selected) else {
            return LlmResult::failure(format!(
                "LLM provider instance '{}' is not available",
                selected
            ));
        };

        if !instance.provider.is_configured() {
            return LlmResult::failure(format!(
                "LLM provider instance '{}' is not properly configured",
                selected
            ));
        }

        info!("Generating response via {}", instance.provider.provider_name());
        let result = instance
            .provider
            .generate(system_prompt.unwrap_or(""), user_prompt)
            .await;

        if result.is_success() {
            info!(
                "Response generated successfully via {}",
                instance.provider.provider_name()
            );
        } else {
            error!(
                "Failed to generate response via {}: {}",
                instance.provider.provider_name(),
                result.error_details.as_deref().unwrap_or("unknown error")
            );
        }

        result
    }

    /// Test one instance, or all when no name is given.
    ///
    /// An unknown requested name yields a synthesized failure entry rather
    /// than an error.
    pub async fn test_providers(&self, instance_name: Option<&str>) -> Vec<(String, LlmResult)> {
        let names: Vec<String> = match instance_name {
            Some(name) => vec![name.to_string()],
            None => self.instances.iter().map(|i| i.name.clone()).collect(),
        };

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let Some(instance) = self.instance(&name) else {
                results.push((
                    name.clone(),
                    LlmResult::failure(format!("LLM provider instance '{}' not found", name)),
                ));
                continue;
            };

            info!("Testing {} provider...", instance.provider.provider_name());
            let result = if instance.provider.is_configured() {
                instance.provider.test_connection().await
            } else {
                LlmResult::failure(format!(
                    "{} provider is not configured",
                    instance.provider.provider_name()
                ))
            };
            results.push((name, result));
        }

        results
    }

    /// Live status of every instance; `configured` is recomputed, not the
    /// registration-time snapshot.
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
    ///
    /// One broken provider cannot block releasing the rest.
    pub async fn cleanup_all(&self) {
        for instance in &self.instances {
            instance.provider.cleanup().await;
        }
        info!("All LLM provider resources cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubLlm {
        name: String,
        configured: bool,
        calls: Arc<AtomicUsize>,
    }

    impl StubLlm {
        fn boxed(name: &str, configured: bool) -> Box<dyn LlmProvider> {
            Box::new(Self {
                name: name.to_string(),
                configured,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn boxed_counting(
            name: &str,
            configured: bool,
            calls: Arc<AtomicUsize>,
        ) -> Box<dyn LlmProvider> {
            Box::new(Self {
                name: name.to_string(),
                configured,
                calls,
            })
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn provider_name(&self) -> String {
            format!("Stub ({})", self.name)
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn generate(&self, _system_prompt: &str, _user_prompt: &str) -> LlmResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            LlmResult::success(format!("reply from {}", self.name))
        }

        async fn test_connection(&self) -> LlmResult {
            LlmResult::success("ok")
        }

        async fn cleanup(&self) {}
    }

    #[tokio::test]
    async fn test_auto_selection_prefers_first_configured() {
        let mut manager = LlmManager::new();
        manager.register("a", "stub", StubLlm::boxed("a", false));
        manager.register("b", "stub", StubLlm::boxed("b", true));
        manager.register("c", "stub", StubLlm::boxed("c", true));

        // Deterministic: always the first configured instance in
        // registration order.
        for _ in 0..3 {
            let result = manager.generate_response("hello", None, None).await;
            assert_eq!(result.response.as_deref(), Some("reply from b"));
        }
    }

    #[tokio::test]
    async fn test_no_configured_instances() {
        let mut manager = LlmManager::new();
        manager.register("a", "stub", StubLlm::boxed("a", false));

        let result = manager.generate_response("hello", None, None).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result
            .error_details
            .unwrap()
            .contains("No LLM provider instances are configured"));
    }

    #[tokio::test]
    async fn test_unknown_instance_name() {
        let manager = LlmManager::new();
        let result = manager.generate_response("hello", Some("ghost"), None).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn test_unconfigured_instance_rejected_without_backend_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut manager = LlmManager::new();
        manager.register(
            "a",
            "stub",
            StubLlm::boxed_counting("a", false, calls.clone()),
        );

        let result = manager.generate_response("hello", Some("a"), None).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result
            .error_details
            .unwrap()
            .contains("not properly configured"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let mut manager = LlmManager::new();
        manager.register("a", "stub", StubLlm::boxed("a", true));

        let result = manager.generate_response("   \n", None, None).await;
        assert_eq!(result.status, ProviderStatus::Failed);
        assert!(result.error_details.unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_duplicate_names_first_wins() {
        let mut manager = LlmManager::new();
        manager.register("dup", "stub", StubLlm::boxed("first", true));
        manager.register("dup", "stub", StubLlm::boxed("second", true));

        let result = manager.generate_response("hello", Some("dup"), None).await;
        assert_eq!(result.response.as_deref(), Some("reply from first"));
        assert_eq!(manager.get_provider_status().len(), 1);
    }

    #[tokio::test]
    async fn test_test_providers_synthesizes_unknown_entry() {
        let mut manager = LlmManager::new();
        manager.register("a", "stub", StubLlm::boxed("a", true));

        let results = manager.test_providers(Some("ghost")).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "ghost");
        assert_eq!(results[0].1.status, ProviderStatus::Failed);
        assert!(results[0].1.error_details.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_from_configs_skips_unknown_and_disabled() {
        let configs = vec![
            ProviderInstanceConfig {
                name: "local".to_string(),
                kind: "ollama".to_string(),
                enabled: true,
                config: toml::Table::new(),
            },
            ProviderInstanceConfig {
                name: "off".to_string(),
                kind: "ollama".to_string(),
                enabled: false,
                config: toml::Table::new(),
            },
            ProviderInstanceConfig {
                name: "weird".to_string(),
                kind: "does-not-exist".to_string(),
                enabled: true,
                config: toml::Table::new(),
            },
        ];

        let manager = LlmManager::from_configs(&configs);
        let status = manager.get_provider_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].name, "local");
    }
}
