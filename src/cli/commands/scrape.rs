//! Scrape command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::summary::SummaryService;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// Run the scrape command.
pub async fn run_scrape(channel: Option<&str>, force: bool, settings: Settings) -> Result<()> {
    let service = SummaryService::from_settings(&settings)?;
    let channels = service.channels();

    match channel {
        Some(name) => {
            let Some(config) = channels.channel_by_name(name) else {
                Output::error(&format!("Channel '{}' is not configured for scraping", name));
                anyhow::bail!("unknown channel: {}", name);
            };

            Output::info(&format!("Scraping channel: {}", name));
            let result = channels.process_channel(&config.clone(), force).await;

            Output::channel_result(
                &result.channel_name,
                result.videos_found,
                result.new_transcripts,
                result.cached_transcripts,
                result.errors.len(),
            );
            for error in &result.errors {
                Output::warning(error);
            }
        }
        None => {
            let total = channels.channels().len();
            if total == 0 {
                Output::info("No active channels configured. Enable channels with scrap = true.");
                return Ok(());
            }

            Output::info(&format!("Scraping {} channels", total));
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template("  [{bar:30}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let mut summary_results = Vec::new();
            for config in channels.channels().to_vec() {
                bar.set_message(config.name.clone());
                let result = channels.process_channel(&config, force).await;
                summary_results.push(result);
                bar.inc(1);
            }
            bar.finish_and_clear();

            Output::header("Scrape Results");
            let mut total_new = 0;
            let mut total_errors = 0;
            for result in &summary_results {
                Output::channel_result(
                    &result.channel_name,
                    result.videos_found,
                    result.new_transcripts,
                    result.cached_transcripts,
                    result.errors.len(),
                );
                total_new += result.new_transcripts;
                total_errors += result.errors.len();
            }

            println!();
            Output::kv("New transcripts", &total_new.to_string());
            Output::kv("Errors", &total_errors.to_string());

            if total_errors > 0 {
                Output::warning("Some videos failed; see the log for details.");
            }
        }
    }

    Ok(())
}
