//! Cleanup command implementation.

use crate::cache::TranscriptCache;
use crate::cli::Output;
use crate::config::Settings;
use crate::summary::SummaryService;
use anyhow::Result;

/// Run the cleanup command.
pub async fn run_cleanup(max_age_hours: u64, settings: Settings) -> Result<()> {
    let service = SummaryService::from_settings(&settings)?;

    Output::info(&format!(
        "Removing summary audio older than {} hours",
        max_age_hours
    ));
    let report = service.cleanup_audio_files(max_age_hours);
    Output::kv("Removed audio files", &report.removed_files.to_string());

    let cache = TranscriptCache::new(settings.data_dir().join("youtube_transcripts"))?;
    let removed_dirs = cache.cleanup_empty_directories();
    Output::kv("Removed empty directories", &removed_dirs.to_string());

    Output::success("Cleanup complete.");
    Ok(())
}
