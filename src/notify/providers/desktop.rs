//! Desktop notification provider.
//!
//! Shows a local desktop notification via the system notification daemon.
//! Needs no credentials, so it is always configured; useful as a fallback
//! when no messaging provider is set up.

use crate::notify::{NotificationProvider, NotificationResult};
use crate::provider;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Notification provider backed by the local desktop notification daemon.
pub struct DesktopProvider {
    instance_name: String,
    app_name: String,
    summary: String,
    timeout_ms: i64,
}

impl DesktopProvider {
    pub fn new(instance_name: &str, config: &toml::Table) -> Self {
        debug!("Desktop provider '{}' initialized", instance_name);

        Self {
            instance_name: instance_name.to_string(),
            app_name: provider::str_value(config, "app_name", "hark"),
            summary: provider::str_value(config, "summary", "Hark"),
            timeout_ms: provider::int_value(config, "timeout_ms", 10_000),
        }
    }

    fn show(&self, body: &str) -> NotificationResult {
        let timeout = match self.timeout_ms {
            ms if ms <= 0 => notify_rust::Timeout::Default,
            ms => notify_rust::Timeout::Milliseconds(ms.min(i32::MAX as i64) as u32),
        };

        match notify_rust::Notification::new()
            .appname(&self.app_name)
            .summary(&self.summary)
            .body(body)
            .timeout(timeout)
            .show()
        {
            Ok(_) => NotificationResult::success("Desktop notification shown"),
            Err(e) => {
                NotificationResult::failure(format!("Failed to show desktop notification: {}", e))
            }
        }
    }
}

#[async_trait]
impl NotificationProvider for DesktopProvider {
    fn provider_name(&self) -> String {
        format!("Desktop ({})", self.instance_name)
    }

    fn is_configured(&self) -> bool {
        // No credentials required; the notification daemon is only
        // reachable at send time.
        true
    }

    async fn send(&self, message: &str, audio_file: Option<&Path>) -> NotificationResult {
        if message.trim().is_empty() {
            return NotificationResult::failure("Message text cannot be empty");
        }

        // Desktop notifications can't embed audio; point at the file instead.
        let body = match audio_file {
            Some(path) => format!("{}\n\nAudio: {}", message, path.display()),
            None => message.to_string(),
        };

        self.show(&body)
    }

    async fn test_connection(&self) -> NotificationResult {
        let result = self.show("Connection test from hark");
        if result.is_success() {
            NotificationResult::success(format!(
                "Connection successful. Notifications shown as '{}'",
                self.app_name
            ))
        } else {
            result
        }
    }

    async fn cleanup(&self) {}
}
