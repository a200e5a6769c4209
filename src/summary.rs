//! Summary pipeline: transcript -> LLM summary -> TTS audio -> notification.
//!
//! Each stage is gated on the previous one succeeding; a failed LLM or TTS
//! stage records `summary_error` on the video row and stops, while a failed
//! notification is a warning only since the text and audio already exist.

use crate::cache::TranscriptCache;
use crate::config::{ChannelSummaryConfig, Settings};
use crate::error::Result;
use crate::llm::LlmManager;
use crate::notify::NotificationManager;
use crate::store::{SummaryStats, VideoStore};
use crate::tts::TtsManager;
use crate::youtube::{ChannelManager, YtDlpFetcher};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Spoken-word rate used to estimate summary duration in notifications.
const WORDS_PER_MINUTE: usize = 150;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a podcast host creating an engaging audio summary of a YouTube video transcript.

Your task:
1. Convert the transcript into a conversational, easy-to-listen format
2. Focus on the key insights, main points, and takeaways
3. Make it sound natural for audio playback (use conversational language)
4. Keep it concise but informative (aim for 3-5 minutes when spoken)
5. Start with a brief intro mentioning the video title
6. End with a conclusion summarizing the main value

Style: Conversational, engaging, podcast-like
Tone: Friendly but informative
Length: 500-800 words (approximately 3-5 minutes of audio)

Important: Output ONLY the summary text, no meta-commentary or explanations.";

/// Outcome of processing a single video.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoSummaryOutcome {
    pub success: bool,
    pub skipped: bool,
    pub video_title: Option<String>,
    pub summary_length: Option<usize>,
    pub audio_path: Option<String>,
    pub text_path: Option<String>,
    pub error: Option<String>,
}

impl VideoSummaryOutcome {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn skipped(error: impl Into<String>) -> Self {
        Self {
            skipped: true,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Per-channel tally within a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummaryResult {
    pub channel_name: String,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Overall tally of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelSummaryReport {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub channel_results: Vec<ChannelSummaryResult>,
    pub error: Option<String>,
}

/// Result of retrying previously failed summaries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetryReport {
    pub processed: usize,
    pub failed: usize,
    pub message: String,
}

/// Result of audio housekeeping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub removed_files: usize,
    pub message: String,
}

/// Orchestrates the full summary pipeline for single videos and batches.
pub struct SummaryService {
    settings: Settings,
    store: Arc<VideoStore>,
    cache: Arc<TranscriptCache>,
    llm: Arc<LlmManager>,
    tts: Arc<TtsManager>,
    notify: Arc<NotificationManager>,
    channels: Arc<ChannelManager>,
    audio_dir: PathBuf,
    text_dir: PathBuf,
}

impl SummaryService {
    /// Build the service and all its collaborators from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = Arc::new(VideoStore::new(&settings.database_path())?);
        let cache = Arc::new(TranscriptCache::new(
            settings.data_dir().join("youtube_transcripts"),
        )?);
        let llm = Arc::new(LlmManager::from_configs(&settings.llm.providers));
        let tts = Arc::new(TtsManager::from_configs(&settings.tts.providers));
        let notify = Arc::new(NotificationManager::from_configs(
            &settings.notifications.providers,
        ));
        let channels = Arc::new(ChannelManager::new(
            settings,
            Arc::new(YtDlpFetcher::new()),
            store.clone(),
            cache.clone(),
        ));

        Self::with_components(settings.clone(), store, cache, llm, tts, notify, channels)
    }

    /// Build the service from pre-constructed components.
    pub fn with_components(
        settings: Settings,
        store: Arc<VideoStore>,
        cache: Arc<TranscriptCache>,
        llm: Arc<LlmManager>,
        tts: Arc<TtsManager>,
        notify: Arc<NotificationManager>,
        channels: Arc<ChannelManager>,
    ) -> Result<Self> {
        let audio_dir = settings.audio_dir();
        let text_dir = settings.text_dir();
        std::fs::create_dir_all(&audio_dir)?;
        std::fs::create_dir_all(&text_dir)?;

        info!("Summary service initialized");
        Ok(Self {
            settings,
            store,
            cache,
            llm,
            tts,
            notify,
            channels,
            audio_dir,
            text_dir,
        })
    }

    pub fn store(&self) -> &Arc<VideoStore> {
        &self.store
    }

    pub fn channels(&self) -> &Arc<ChannelManager> {
        &self.channels
    }

    pub fn llm(&self) -> &Arc<LlmManager> {
        &self.llm
    }

    pub fn tts(&self) -> &Arc<TtsManager> {
        &self.tts
    }

    pub fn notify(&self) -> &Arc<NotificationManager> {
        &self.notify
    }

    /// Release every provider backend across all three capabilities.
    pub async fn cleanup_providers(&self) {
        self.llm.cleanup_all().await;
        self.tts.cleanup_all().await;
        self.notify.cleanup_all().await;
    }

    /// Run the full pipeline for one video.
    pub async fn process_video_summary(
        &self,
        video_url: &str,
        summary_config: Option<&ChannelSummaryConfig>,
    ) -> VideoSummaryOutcome {
        info!("Processing summary for video: {}", video_url);

        let video = match self.store.get_video_by_url(video_url) {
            Ok(Some(video)) => video,
            Ok(None) => return VideoSummaryOutcome::failure("Video not found in database"),
            Err(e) => return VideoSummaryOutcome::failure(format!("Database error: {}", e)),
        };

        let Some(transcript_path) = video.transcript_path.clone() else {
            return VideoSummaryOutcome::skipped("No transcript available");
        };

        let transcript = match self
            .cache
            .load_transcript_by_path(Path::new(&transcript_path))
        {
            Ok(Some(data)) if data.has_text() => data,
            Ok(_) => return VideoSummaryOutcome::failure("Failed to load transcript"),
            Err(e) => {
                return VideoSummaryOutcome::failure(format!("Failed to load transcript: {}", e));
            }
        };

        let transcript_text = transcript.text.unwrap_or_default();
        let video_title = video.title.clone().unwrap_or_else(|| "Untitled".to_string());
        let video_id = if video.video_id.is_empty() {
            "unknown".to_string()
        } else {
            video.video_id.clone()
        };

        let empty_config = ChannelSummaryConfig::default();
        let config = summary_config.unwrap_or(&empty_config);
        let system_prompt = config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        // Step 1: generate the summary text.
        info!("Generating summary for: {}", video_title);
        let llm_result = self
            .llm
            .generate_response(
                &transcript_text,
                config.llm_provider.as_deref(),
                Some(system_prompt),
            )
            .await;

        if !llm_result.is_success() {
            let msg = format!(
                "LLM generation failed: {}",
                llm_result.error_details.as_deref().unwrap_or("unknown error")
            );
            self.record_summary_error(video_url, &msg);
            return VideoSummaryOutcome::failure(msg);
        }

        let summary_text = llm_result.response.unwrap_or_default();
        info!(
            "Summary generated successfully ({} characters)",
            summary_text.chars().count()
        );

        // Step 2: persist the summary text for audit/debug. Best-effort.
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let text_path = self
            .text_dir
            .join(format!("summary_{}_{}.txt", video_id, timestamp));
        let text_content = format!(
            "Video Title: {}\nVideo URL: {}\nChannel: {}\nGenerated: {}\n\n{}\n\n{}",
            video_title,
            video_url,
            video.channel_name.as_deref().unwrap_or("Unknown"),
            Utc::now().to_rfc3339(),
            "=".repeat(80),
            summary_text,
        );
        match std::fs::write(&text_path, text_content) {
            Ok(()) => info!("Summary text saved: {}", text_path.display()),
            Err(e) => warn!("Failed to save summary text file: {}", e),
        }

        // Step 3: synthesize the summary audio.
        let audio_filename = format!("summary_{}_{}.wav", video_id, timestamp);
        info!("Converting summary to audio: {}", audio_filename);
        let tts_result = self
            .tts
            .generate_speech(&summary_text, &audio_filename, config.tts_provider.as_deref())
            .await;

        if !tts_result.is_success() {
            let msg = format!(
                "TTS conversion failed: {}",
                tts_result.error_details.as_deref().unwrap_or("unknown error")
            );
            self.record_summary_error(video_url, &msg);
            return VideoSummaryOutcome::failure(msg);
        }

        let audio_path = tts_result
            .output_file
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("Audio generated and saved permanently: {}", audio_path);

        // Step 4: notify with the audio attached. Failure here is a warning
        // only; the text and audio are already produced and stored.
        let estimated_minutes = summary_text.split_whitespace().count() / WORDS_PER_MINUTE;
        let notification_message = format!(
            "New Video Summary: {}\n\nChannel: {}\nDuration: ~{} minutes\n\n[Audio file attached]",
            video_title,
            video.channel_name.as_deref().unwrap_or("Unknown"),
            estimated_minutes,
        );

        info!("Sending notification for: {}", video_title);
        let notification_result = self
            .notify
            .send_message(
                &notification_message,
                Some(Path::new(&audio_path)),
                config.notification_provider.as_deref(),
            )
            .await;

        if !notification_result.is_success() {
            warn!(
                "Notification failed: {}",
                notification_result
                    .error_details
                    .as_deref()
                    .unwrap_or("unknown error")
            );
        } else {
            info!("Notification sent successfully");
        }

        // Step 5: mark the row processed, clearing any prior error.
        if let Err(e) = self
            .store
            .mark_summary_processed(video_url, &summary_text, Some(&audio_path))
        {
            let msg = format!("Failed to update database: {}", e);
            error!("{}", msg);
            return VideoSummaryOutcome::failure(msg);
        }

        info!(
            "Summary processing completed - Text: {}, Audio: {}",
            text_path.display(),
            audio_path
        );

        VideoSummaryOutcome {
            success: true,
            skipped: false,
            video_title: Some(video_title),
            summary_length: Some(summary_text.chars().count()),
            audio_path: Some(audio_path),
            text_path: Some(text_path.to_string_lossy().to_string()),
            error: None,
        }
    }

    fn record_summary_error(&self, video_url: &str, message: &str) {
        error!("{}", message);
        if let Err(e) = self.store.mark_summary_error(video_url, message) {
            error!("Failed to record summary error for {}: {}", video_url, e);
        }
    }

    /// Run the pipeline over the unsummarized videos of one channel or all
    /// summary-enabled channels.
    pub async fn process_channel_summaries(
        &self,
        channel_name: Option<&str>,
        limit: Option<usize>,
        force: bool,
        scrape_first: bool,
    ) -> ChannelSummaryReport {
        info!(
            "Starting summary processing for channel: {}",
            channel_name.unwrap_or("all enabled channels")
        );

        // Optional scrape pass; failures here never stop summary processing.
        if scrape_first {
            info!("Scraping for new videos before processing summaries");
            match channel_name.and_then(|name| self.channels.channel_by_name(name)) {
                Some(channel) => {
                    let channel = channel.clone();
                    let result = self.channels.process_channel(&channel, force).await;
                    for error in &result.errors {
                        warn!("Scraping encountered an error: {}", error);
                    }
                }
                None if channel_name.is_none() => {
                    let summary = self.channels.process_all_channels(force).await;
                    info!(
                        "Scraping completed - New transcripts: {}",
                        summary.total_new_transcripts
                    );
                }
                None => warn!(
                    "Channel '{}' not active for scraping, continuing with stored videos",
                    channel_name.unwrap_or_default()
                ),
            }
        }

        // Resolve the target channel set.
        let targets: Vec<(String, String, ChannelSummaryConfig)> = match channel_name {
            Some(name) => {
                let Some(config) = self.settings.channel_summary_config(name) else {
                    return ChannelSummaryReport {
                        error: Some(format!(
                            "Channel '{}' not found or summary not enabled",
                            name
                        )),
                        ..Default::default()
                    };
                };
                let url = self
                    .settings
                    .channel_by_name(name)
                    .map(|c| c.url.clone())
                    .unwrap_or_default();
                vec![(name.to_string(), url, config.clone())]
            }
            None => {
                let channels = self.settings.summary_enabled_channels();
                if channels.is_empty() {
                    return ChannelSummaryReport {
                        error: Some("No channels with summary enabled".to_string()),
                        ..Default::default()
                    };
                }
                channels
                    .into_iter()
                    .map(|c| (c.name.clone(), c.url.clone(), c.summary.clone()))
                    .collect()
            }
        };

        let mut report = ChannelSummaryReport::default();

        for (name, url, config) in targets {
            info!("Processing summaries for channel: {}", name);

            if url.is_empty() {
                warn!("Channel URL not found for: {}", name);
                continue;
            }

            let videos = match self.store.get_unsummarized_videos(Some(&url), limit) {
                Ok(videos) => videos,
                Err(e) => {
                    error!("Failed to query unsummarized videos for {}: {}", name, e);
                    continue;
                }
            };

            if videos.is_empty() {
                info!("No unsummarized videos for channel: {}", name);
                report.channel_results.push(ChannelSummaryResult {
                    channel_name: name,
                    processed: 0,
                    failed: 0,
                    skipped: 0,
                });
                continue;
            }

            let mut result = ChannelSummaryResult {
                channel_name: name,
                processed: 0,
                failed: 0,
                skipped: 0,
            };

            for video in videos {
                let outcome = self.process_video_summary(&video.url, Some(&config)).await;
                if outcome.success {
                    result.processed += 1;
                } else if outcome.skipped {
                    result.skipped += 1;
                } else {
                    result.failed += 1;
                }
            }

            report.processed += result.processed;
            report.failed += result.failed;
            report.skipped += result.skipped;
            report.channel_results.push(result);
        }

        info!(
            "Summary processing completed - Processed: {}, Failed: {}, Skipped: {}",
            report.processed, report.failed, report.skipped
        );

        report
    }

    /// Re-run the pipeline for videos whose last summary attempt failed.
    ///
    /// Each video uses its own channel's summary configuration.
    pub async fn retry_failed_summaries(&self, limit: Option<usize>) -> RetryReport {
        info!("Retrying failed summaries");

        let failed_videos = match self.store.get_failed_summaries(limit) {
            Ok(videos) => videos,
            Err(e) => {
                return RetryReport {
                    message: format!("Error retrying failed summaries: {}", e),
                    ..Default::default()
                };
            }
        };

        if failed_videos.is_empty() {
            return RetryReport {
                message: "No failed summaries to retry".to_string(),
                ..Default::default()
            };
        }

        let mut report = RetryReport::default();
        for video in failed_videos {
            let config = video
                .channel_name
                .as_deref()
                .and_then(|name| self.settings.channel_summary_config(name))
                .cloned();

            let outcome = self
                .process_video_summary(&video.url, config.as_ref())
                .await;
            if outcome.success {
                report.processed += 1;
            } else {
                report.failed += 1;
            }
        }

        report.message = format!(
            "Retry completed - Processed: {}, Failed: {}",
            report.processed, report.failed
        );
        report
    }

    /// Delete audio files older than `max_age_hours` from the permanent
    /// audio directory.
    ///
    /// Filesystem housekeeping only; database references are not consulted.
    pub fn cleanup_audio_files(&self, max_age_hours: u64) -> CleanupReport {
        info!("Cleaning up audio files older than {} hours", max_age_hours);

        if !self.audio_dir.exists() {
            return CleanupReport {
                removed_files: 0,
                message: "Audio directory does not exist".to_string(),
            };
        }

        let max_age = std::time::Duration::from_secs(max_age_hours * 3600);
        let now = std::time::SystemTime::now();
        let mut removed = 0;

        let entries = match std::fs::read_dir(&self.audio_dir) {
            Ok(entries) => entries,
            Err(e) => {
                return CleanupReport {
                    removed_files: 0,
                    message: format!("Error cleaning up audio files: {}", e),
                };
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());

            if age.is_some_and(|age| age > max_age) {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        removed += 1;
                        info!("Removed old audio file: {}", path.display());
                    }
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                }
            }
        }

        let message = format!("Cleaned up {} audio files", removed);
        info!("{}", message);
        CleanupReport {
            removed_files: removed,
            message,
        }
    }

    /// Summary-processing statistics from the store.
    pub fn summary_stats(&self) -> Result<SummaryStats> {
        self.store.summary_stats()
    }
}
