//! Notification providers for Hark.
//!
//! Providers deliver a finished summary (text plus optional audio file) to
//! the user; the [`NotificationManager`] builds named instances from
//! configuration and dispatches to them.

mod manager;
pub mod providers;

pub use manager::NotificationManager;

use crate::provider::ProviderStatus;
use async_trait::async_trait;
use std::path::Path;

/// Result of a notification delivery attempt.
#[derive(Debug, Clone)]
pub struct NotificationResult {
    pub status: ProviderStatus,
    /// Human-readable confirmation, e.g. "Message sent successfully".
    pub message: Option<String>,
    pub error_details: Option<String>,
    pub provider_response: Option<serde_json::Value>,
}

impl NotificationResult {
    /// A successful delivery with a confirmation string.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Success,
            message: Some(message.into()),
            error_details: None,
            provider_response: None,
        }
    }

    /// A failed delivery with a human-readable explanation.
    pub fn failure(error_details: impl Into<String>) -> Self {
        Self {
            status: ProviderStatus::Failed,
            message: None,
            error_details: Some(error_details.into()),
            provider_response: None,
        }
    }

    pub fn with_provider_response(mut self, raw: Option<serde_json::Value>) -> Self {
        self.provider_response = raw;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ProviderStatus::Success
    }
}

/// Contract implemented by every notification provider.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Human-readable provider name, e.g. "Telegram (personal)".
    fn provider_name(&self) -> String;

    /// Whether the instance's static configuration looks usable.
    ///
    /// Must be cheap: no network calls.
    fn is_configured(&self) -> bool;

    /// Send a message, optionally attaching an audio file. Expected
    /// failures are returned as `Failed` results, never as panics or errors.
    async fn send(&self, message: &str, audio_file: Option<&Path>) -> NotificationResult;

    /// Validate end-to-end reachability without leaking secrets.
    async fn test_connection(&self) -> NotificationResult;

    /// Release lazily-held backend resources. Safe to call repeatedly.
    async fn cleanup(&self);
}
