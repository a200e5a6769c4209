//! Configuration management for Hark.

mod settings;

pub use settings::{
    ChannelConfig, ChannelSummaryConfig, DatabaseSettings, GeneralSettings, LlmSettings,
    NotificationSettings, Settings, SummaryStorageSettings, TtsSettings, YoutubeSettings,
};
