//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to render configuration: {}", e))?;
            println!("{}", content);
        }
        ConfigAction::Path => {
            let path = Settings::default_config_path();
            Output::kv("Config path", &path.to_string_lossy());
            if !path.exists() {
                Output::info("File does not exist yet; defaults are in effect.");
            }
        }
    }

    Ok(())
}
