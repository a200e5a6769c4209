//! Status command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::summary::SummaryService;
use anyhow::Result;

/// Run the status command.
pub async fn run_status(settings: Settings) -> Result<()> {
    let service = SummaryService::from_settings(&settings)?;

    let video_stats = service.store().video_stats()?;
    Output::header("Videos");
    Output::kv("Total", &video_stats.total_videos.to_string());
    Output::kv(
        "With transcripts",
        &video_stats.videos_with_transcripts.to_string(),
    );
    Output::kv("LLM processed", &video_stats.llm_processed.to_string());
    Output::kv("Unique channels", &video_stats.unique_channels.to_string());

    let summary_stats = service.summary_stats()?;
    Output::header("Summaries");
    Output::kv(
        "Processed",
        &summary_stats.summary_processed.to_string(),
    );
    Output::kv("Pending", &summary_stats.pending_summaries.to_string());
    Output::kv("Errors", &summary_stats.summary_errors.to_string());

    let channel_stats = service.channels().channel_stats();
    if !channel_stats.is_empty() {
        Output::header("Channels");
        for stats in &channel_stats {
            Output::list_item(&format!(
                "{} ({} videos, {} transcripts, {} summarized, {} cache files)",
                stats.name,
                stats.total_videos,
                stats.videos_with_transcripts,
                stats.summary_processed,
                stats.cache_files
            ));
        }
    }

    Output::header("Providers");
    for (label, statuses) in [
        ("LLM", service.llm().get_provider_status()),
        ("TTS", service.tts().get_provider_status()),
        ("Notifications", service.notify().get_provider_status()),
    ] {
        println!("  {}:", label);
        if statuses.is_empty() {
            println!("    (none configured)");
        }
        for status in statuses {
            let state = if status.available {
                "available"
            } else if status.configured {
                "configured"
            } else {
                "not configured"
            };
            println!("    {} [{}] - {}", status.name, status.kind, state);
        }
    }

    Ok(())
}
