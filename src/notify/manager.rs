//! Registry and dispatch for notification provider instances.

use super::providers::{DesktopProvider, TelegramProvider};
use super::{NotificationProvider, NotificationResult};
use crate::provider::{InstanceStatus, ProviderInstanceConfig};
use std::path::Path;
use tracing::{debug, error, info, warn};

type NotificationCtor = fn(&str, &toml::Table) -> Box<dyn NotificationProvider>;

/// Known provider types, dispatched by the `type` field of an instance config.
fn provider_registry() -> &'static [(&'static str, NotificationCtor)] {
    &[
        ("telegram", |name, config| {
            Box::new(TelegramProvider::new(name, config))
        }),
        ("desktop", |name, config| {
            Box::new(DesktopProvider::new(name, config))
        }),
    ]
}

struct RegisteredInstance {
    name: String,
    kind: String,
    configured_at_init: bool,
    provider: Box<dyn NotificationProvider>,
}

/// High-level notification manager owning all configured provider instances.
#[derive(Default)]
pub struct NotificationManager {
    instances: Vec<RegisteredInstance>,
}

impl NotificationManager {
    /// Create an empty manager with no instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager from provider instance configurations.
    pub fn from_configs(configs: &[ProviderInstanceConfig]) -> Self {
        let mut manager = Self::new();

        for instance in configs {
            if instance.name.is_empty() {
                warn!("Notification provider instance missing name, skipping");
                continue;
            }
            if !instance.enabled {
                debug!(
                    "Skipping disabled notification provider instance: {}",
                    instance.name
                );
                continue;
            }

            let kind = instance.kind.to_lowercase();
            let Some((_, ctor)) = provider_registry().iter().find(|(k, _)| *k == kind) else {
                warn!(
                    "Unknown notification provider type: {} for instance: {}",
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
    pub fn register(&mut self, name: &str, kind: &str, provider: Box<dyn NotificationProvider>) {
        if self.instances.iter().any(|i| i.name == name) {
            error!("Duplicate notification provider instance name: {}", name);
            return;
        }

        let configured = provider.is_configured();
        if configured {
            info!(
                "Notification provider '{}' ({}) initialized and configured",
                name, kind
            );
        } else {
            info!(
                "Notification provider '{}' ({}) initialized but not configured",
                name, kind
            );
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

    /// Send a message via a named instance, or auto-select the first
    /// configured one when no name is given.
    pub async fn send_message(
        &self,
        message: &str,
        audio_file: Option<&Path>,
        instance_name: Option<&str>,
    ) -> NotificationResult {
        if message.trim().is_empty() {
            return NotificationResult::failure("Message text cannot be empty");
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
                    return NotificationResult::failure(
                        "No notification provider instances are configured",
                    );
                };
                debug!("Auto-selected notification provider instance: {}", first);
                first
            }
        };

        let Some(instance) = self.instance(&selected) else {
            return NotificationResult::failure(format!(
                "Notification provider instance '{}' is not available",
                selected
            ));
        };

        if !instance.provider.is_configured() {
            return NotificationResult::failure(format!(
                "Notification provider instance '{}' is not properly configured",
                selected
            ));
        }

        info!("Sending notification via {}", instance.provider.provider_name());
        let result = instance.provider.send(message, audio_file).await;

        if result.is_success() {
            info!(
                "Notification sent successfully via {}",
                instance.provider.provider_name()
            );
        } else {
            error!(
                "Failed to send notification via {}: {}",
                instance.provider.provider_name(),
                result.error_details.as_deref().unwrap_or("unknown error")
            );
        }

        result
    }

    /// Test one instance, or all when no name is given.
    pub async fn test_providers(
        &self,
        instance_name: Option<&str>,
    ) -> Vec<(String, NotificationResult)> {
        let names: Vec<String> = match instance_name {
            Some(name) => vec![name.to_string()],
            None => self.instances.iter().map(|i| i.name.clone()).collect(),
        };

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let Some(instance) = self.instance(&name) else {
                results.push((
                    name.clone(),
                    NotificationResult::failure(format!(
                        "Notification provider instance '{}' not found",
                        name
                    )),
                ));
                continue;
            };

            info!("Testing {} provider...", instance.provider.provider_name());
            let result = if instance.provider.is_configured() {
                instance.provider.test_connection().await
            } else {
                NotificationResult::failure(format!(
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
        info!("All notification provider resources cleaned up");
    }
}
