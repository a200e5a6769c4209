//! Shared plumbing for provider instances.
//!
//! Every capability (LLM, TTS, notifications) is served by named provider
//! instances built from configuration. This module holds the pieces they all
//! share: the three-state operation status, the instance config shape, the
//! lazy backend state, and small helpers for reading free-form config tables.

use serde::{Deserialize, Serialize};

/// Outcome status shared by every provider operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Success,
    Failed,
    Pending,
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Success => write!(f, "success"),
            ProviderStatus::Failed => write!(f, "failed"),
            ProviderStatus::Pending => write!(f, "pending"),
        }
    }
}

/// A named, independently configured deployment of a provider type.
///
/// The `config` table is intentionally free-form; each provider type reads
/// the keys it understands and falls back to its own defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInstanceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: toml::Table,
}

fn default_enabled() -> bool {
    true
}

/// Lazily constructed backend handle (model, HTTP client, binary path).
///
/// A failed construction is cached so repeated calls don't re-attempt the
/// load; `is_configured()` being true does not guarantee loading succeeds.
#[derive(Debug)]
pub enum LoadState<T> {
    Unloaded,
    Loaded(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_unloaded(&self) -> bool {
        matches!(self, LoadState::Unloaded)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Unloaded
    }
}

/// Live status of a registered provider instance, as reported by a manager.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    /// Instance name the provider was registered under.
    pub name: String,
    /// Human-readable provider name, e.g. "Ollama (local)".
    pub provider_name: String,
    /// Provider type string, e.g. "ollama".
    pub kind: String,
    /// Whether the instance is currently configured (recomputed, not cached).
    pub configured: bool,
    /// Configured and present in the registry.
    pub available: bool,
}

/// Read a string key from a provider config table, with a default.
pub fn str_value(config: &toml::Table, key: &str, default: &str) -> String {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

/// Read an optional string key from a provider config table.
pub fn opt_str_value(config: &toml::Table, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Read an integer key from a provider config table, with a default.
pub fn int_value(config: &toml::Table, key: &str, default: i64) -> i64 {
    config.get(key).and_then(|v| v.as_integer()).unwrap_or(default)
}

/// Read a float key from a provider config table, with a default.
///
/// Integer values are accepted and widened, since TOML users write `0.7`
/// and `1` interchangeably for generation knobs.
pub fn float_value(config: &toml::Table, key: &str, default: f64) -> f64 {
    match config.get(key) {
        Some(toml::Value::Float(f)) => *f,
        Some(toml::Value::Integer(i)) => *i as f64,
        _ => default,
    }
}

/// Format a duration in a human-readable way for logs.
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    if seconds < 1.0 {
        format!("{:.1}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.2}s", seconds)
    } else {
        let minutes = (seconds / 60.0) as u64;
        format!("{}m {:.1}s", minutes, seconds % 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_config_defaults() {
        let parsed: ProviderInstanceConfig = toml::from_str(
            r#"
            name = "local"
            type = "ollama"
            "#,
        )
        .unwrap();

        assert!(parsed.enabled);
        assert!(parsed.config.is_empty());
        assert_eq!(parsed.kind, "ollama");
    }

    #[test]
    fn test_config_value_helpers() {
        let table: toml::Table = toml::from_str(
            r#"
            model = "llama3"
            timeout_seconds = 30
            temperature = 0.5
            num_predict = 2048
            "#,
        )
        .unwrap();

        assert_eq!(str_value(&table, "model", "default"), "llama3");
        assert_eq!(str_value(&table, "missing", "default"), "default");
        assert_eq!(int_value(&table, "timeout_seconds", 120), 30);
        assert_eq!(float_value(&table, "temperature", 0.7), 0.5);
        // Integers widen to floats for generation knobs.
        assert_eq!(float_value(&table, "num_predict", 0.0), 2048.0);
        assert_eq!(opt_str_value(&table, "missing"), None);
    }

    #[test]
    fn test_load_state_transitions() {
        let mut state: LoadState<u32> = LoadState::default();
        assert!(state.is_unloaded());

        state = LoadState::Loaded(7);
        assert!(state.is_loaded());

        state = LoadState::Failed("no backend".to_string());
        assert!(!state.is_loaded());
        assert!(!state.is_unloaded());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(std::time::Duration::from_millis(500)), "500.0ms");
        assert_eq!(format_elapsed(std::time::Duration::from_secs(5)), "5.00s");
        assert_eq!(format_elapsed(std::time::Duration::from_secs(90)), "1m 30.0s");
    }
}
