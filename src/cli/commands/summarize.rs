//! Summarize command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::summary::SummaryService;
use anyhow::Result;

/// Run the summarize command.
#[allow(clippy::too_many_arguments)]
pub async fn run_summarize(
    channel: Option<&str>,
    url: Option<&str>,
    limit: Option<usize>,
    force: bool,
    no_scrape: bool,
    settings: Settings,
) -> Result<()> {
    let service = SummaryService::from_settings(&settings)?;

    if let Some(video_url) = url {
        // Single-video mode: use the channel's summary config when the
        // video's channel is known.
        let config = service
            .store()
            .get_video_by_url(video_url)?
            .and_then(|v| v.channel_name)
            .and_then(|name| settings.channel_summary_config(&name).cloned());

        Output::info(&format!("Summarizing video: {}", video_url));
        let outcome = service.process_video_summary(video_url, config.as_ref()).await;

        if outcome.success {
            Output::success(&format!(
                "Summarized '{}' ({} characters)",
                outcome.video_title.as_deref().unwrap_or("unknown"),
                outcome.summary_length.unwrap_or(0)
            ));
            if let Some(audio) = &outcome.audio_path {
                Output::kv("Audio", audio);
            }
            if let Some(text) = &outcome.text_path {
                Output::kv("Text", text);
            }
        } else if outcome.skipped {
            Output::warning(&format!(
                "Skipped: {}",
                outcome.error.as_deref().unwrap_or("no transcript")
            ));
        } else {
            let reason = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            Output::error(&reason);
            anyhow::bail!("summary failed: {}", reason);
        }

        service.cleanup_providers().await;
        return Ok(());
    }

    Output::info(&format!(
        "Summarizing pending videos for {}",
        channel.unwrap_or("all enabled channels")
    ));

    let report = service
        .process_channel_summaries(channel, limit, force, !no_scrape)
        .await;

    if let Some(error) = &report.error {
        Output::error(error);
        anyhow::bail!("summary run failed: {}", error);
    }

    Output::header("Summary Results");
    for result in &report.channel_results {
        Output::list_item(&format!(
            "{}: {} processed, {} failed, {} skipped",
            result.channel_name, result.processed, result.failed, result.skipped
        ));
    }

    println!();
    Output::kv("Processed", &report.processed.to_string());
    Output::kv("Failed", &report.failed.to_string());
    Output::kv("Skipped", &report.skipped.to_string());

    service.cleanup_providers().await;

    if report.failed > 0 {
        Output::warning("Some summaries failed; retry them with 'hark retry'.");
    }

    Ok(())
}
