//! Configuration settings for Hark.

use crate::provider::ProviderInstanceConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub database: DatabaseSettings,
    pub summaries: SummaryStorageSettings,
    pub youtube: YoutubeSettings,
    pub llm: LlmSettings,
    pub tts: TtsSettings,
    pub notifications: NotificationSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.hark".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "~/.hark/state.db".to_string(),
        }
    }
}

/// Permanent storage locations for generated summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryStorageSettings {
    /// Directory for synthesized summary audio files.
    pub audio_dir: String,
    /// Directory for summary text files (audit/debug copies).
    pub text_dir: String,
}

impl Default for SummaryStorageSettings {
    fn default() -> Self {
        Self {
            audio_dir: "~/.hark/summaries/audio".to_string(),
            text_dir: "~/.hark/summaries/text".to_string(),
        }
    }
}

/// YouTube platform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeSettings {
    /// Whether YouTube scraping is enabled at all.
    pub enabled: bool,
    /// Tracked channels.
    pub channels: Vec<ChannelConfig>,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: Vec::new(),
        }
    }
}

/// Configuration for a single tracked channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub name: String,
    /// Whether this channel participates in scraping runs.
    pub scrap: bool,
    pub url: String,
    /// Number of latest uploads to inspect per run.
    pub max_videos: usize,
    /// Preferred transcript language code.
    pub language: String,
    /// Channel-specific transcript cache folder.
    pub cache_folder: String,
    /// Summary pipeline configuration for this channel.
    pub summary: ChannelSummaryConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            scrap: false,
            url: String::new(),
            max_videos: 10,
            language: "en".to_string(),
            cache_folder: "~/.hark/youtube_transcripts/default".to_string(),
            summary: ChannelSummaryConfig::default(),
        }
    }
}

/// Per-channel summary pipeline configuration.
///
/// Provider fields are instance names; `None` lets the manager auto-select
/// the first configured instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChannelSummaryConfig {
    pub enabled: bool,
    pub llm_provider: Option<String>,
    pub tts_provider: Option<String>,
    pub notification_provider: Option<String>,
    /// Overrides the built-in podcast-style summarization prompt.
    pub system_prompt: Option<String>,
}

/// LLM provider instances.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmSettings {
    pub providers: Vec<ProviderInstanceConfig>,
}

/// TTS provider instances.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TtsSettings {
    pub providers: Vec<ProviderInstanceConfig>,
}

/// Notification provider instances.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationSettings {
    pub providers: Vec<ProviderInstanceConfig>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::HarkError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hark")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded database path.
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.database.path)
    }

    /// Get the expanded summary audio directory.
    pub fn audio_dir(&self) -> PathBuf {
        Self::expand_path(&self.summaries.audio_dir)
    }

    /// Get the expanded summary text directory.
    pub fn text_dir(&self) -> PathBuf {
        Self::expand_path(&self.summaries.text_dir)
    }

    /// Channels that participate in scraping runs.
    ///
    /// Channels with `scrap = false` or a missing URL are excluded.
    pub fn active_channels(&self) -> Vec<&ChannelConfig> {
        if !self.youtube.enabled {
            return Vec::new();
        }
        self.youtube
            .channels
            .iter()
            .filter(|c| c.scrap && !c.url.is_empty())
            .collect()
    }

    /// Channels with the summary pipeline enabled.
    pub fn summary_enabled_channels(&self) -> Vec<&ChannelConfig> {
        self.youtube
            .channels
            .iter()
            .filter(|c| c.summary.enabled && !c.url.is_empty())
            .collect()
    }

    /// Look up a channel by name.
    pub fn channel_by_name(&self, name: &str) -> Option<&ChannelConfig> {
        self.youtube.channels.iter().find(|c| c.name == name)
    }

    /// Summary configuration for a named channel, if summaries are enabled.
    pub fn channel_summary_config(&self, name: &str) -> Option<&ChannelSummaryConfig> {
        self.channel_by_name(name)
            .filter(|c| c.summary.enabled)
            .map(|c| &c.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.general.log_level, "info");
        assert!(settings.youtube.enabled);
        assert!(settings.llm.providers.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let settings: Settings = toml::from_str(
            r#"
            [general]
            data_dir = "/tmp/hark"

            [database]
            path = "/tmp/hark/state.db"

            [[youtube.channels]]
            name = "tech-talks"
            scrap = true
            url = "https://www.youtube.com/@techtalks"
            max_videos = 5
            language = "en"
            cache_folder = "/tmp/hark/cache/tech-talks"

            [youtube.channels.summary]
            enabled = true
            llm_provider = "local"

            [[llm.providers]]
            name = "local"
            type = "ollama"

            [llm.providers.config]
            model = "llama3"
            "#,
        )
        .unwrap();

        assert_eq!(settings.youtube.channels.len(), 1);
        let channel = &settings.youtube.channels[0];
        assert_eq!(channel.name, "tech-talks");
        assert!(channel.summary.enabled);
        assert_eq!(channel.summary.llm_provider.as_deref(), Some("local"));
        assert_eq!(settings.llm.providers[0].kind, "ollama");
    }

    #[test]
    fn test_active_channels_filters_disabled() {
        let mut settings = Settings::default();
        settings.youtube.channels = vec![
            ChannelConfig {
                name: "on".to_string(),
                scrap: true,
                url: "https://www.youtube.com/@on".to_string(),
                ..Default::default()
            },
            ChannelConfig {
                name: "off".to_string(),
                scrap: false,
                url: "https://www.youtube.com/@off".to_string(),
                ..Default::default()
            },
            ChannelConfig {
                name: "no-url".to_string(),
                scrap: true,
                ..Default::default()
            },
        ];

        let active = settings.active_channels();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "on");

        settings.youtube.enabled = false;
        assert!(settings.active_channels().is_empty());
    }

    #[test]
    fn test_channel_summary_config_requires_enabled() {
        let mut settings = Settings::default();
        settings.youtube.channels = vec![ChannelConfig {
            name: "quiet".to_string(),
            ..Default::default()
        }];

        assert!(settings.channel_summary_config("quiet").is_none());

        settings.youtube.channels[0].summary.enabled = true;
        assert!(settings.channel_summary_config("quiet").is_some());
    }
}
