//! Retry command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::summary::SummaryService;
use anyhow::Result;

/// Run the retry command.
pub async fn run_retry(limit: Option<usize>, settings: Settings) -> Result<()> {
    let service = SummaryService::from_settings(&settings)?;

    Output::info("Retrying failed summaries");
    let report = service.retry_failed_summaries(limit).await;

    Output::kv("Processed", &report.processed.to_string());
    Output::kv("Failed", &report.failed.to_string());
    Output::info(&report.message);

    service.cleanup_providers().await;
    Ok(())
}
