//! Channel scraping: drives per-video cache/database checks and transcript
//! fetching for every configured channel.

use super::TranscriptSource;
use crate::cache::TranscriptCache;
use crate::config::{ChannelConfig, Settings};
use crate::store::{NewVideo, VideoStore};
use crate::transcript::VideoListing;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-video outcome of a scraping pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    NewTranscript,
    Cached,
    NoTranscript,
    Error,
}

/// What happened to one video during channel processing.
#[derive(Debug, Clone, Serialize)]
pub struct VideoOutcome {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub status: VideoStatus,
    pub transcript_path: Option<String>,
    pub error: Option<String>,
}

/// Aggregated result of processing one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelScrapeResult {
    pub channel_name: String,
    pub channel_url: String,
    pub videos_found: usize,
    pub new_transcripts: usize,
    pub cached_transcripts: usize,
    pub errors: Vec<String>,
    pub processed_videos: Vec<VideoOutcome>,
}

impl ChannelScrapeResult {
    fn empty(channel: &ChannelConfig) -> Self {
        Self {
            channel_name: channel.name.clone(),
            channel_url: channel.url.clone(),
            videos_found: 0,
            new_transcripts: 0,
            cached_transcripts: 0,
            errors: Vec::new(),
            processed_videos: Vec::new(),
        }
    }
}

/// Aggregated result of processing every active channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeSummary {
    pub total_channels: usize,
    pub processed_channels: usize,
    pub total_videos_found: usize,
    pub total_new_transcripts: usize,
    pub total_cached_transcripts: usize,
    pub total_errors: usize,
    pub channel_results: Vec<ChannelScrapeResult>,
}

/// Per-channel statistics joining database counts with cache usage.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub max_videos: usize,
    pub language: String,
    pub total_videos: usize,
    pub videos_with_transcripts: usize,
    pub llm_processed: usize,
    pub summary_processed: usize,
    pub cache_files: usize,
    pub cache_size_mb: f64,
}

/// Manages the configured channel set and drives scraping runs.
pub struct ChannelManager {
    channels: Vec<ChannelConfig>,
    source: Arc<dyn TranscriptSource>,
    store: Arc<VideoStore>,
    cache: Arc<TranscriptCache>,
}

impl ChannelManager {
    /// Load the active channel set from settings.
    pub fn new(
        settings: &Settings,
        source: Arc<dyn TranscriptSource>,
        store: Arc<VideoStore>,
        cache: Arc<TranscriptCache>,
    ) -> Self {
        let channels: Vec<ChannelConfig> = settings
            .active_channels()
            .into_iter()
            .map(|c| {
                let mut channel = c.clone();
                channel.cache_folder = Settings::expand_path(&c.cache_folder)
                    .to_string_lossy()
                    .to_string();
                channel
            })
            .collect();

        info!("Loaded {} active YouTube channels", channels.len());
        Self {
            channels,
            source,
            store,
            cache,
        }
    }

    /// All active channels.
    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    /// Look up an active channel by name.
    pub fn channel_by_name(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Look up an active channel by URL.
    pub fn channel_by_url(&self, url: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.url == url)
    }

    /// Fetch latest videos and transcripts for a single channel.
    ///
    /// Per-video failures are captured in the result and never abort the
    /// batch.
    pub async fn process_channel(
        &self,
        channel: &ChannelConfig,
        force_refresh: bool,
    ) -> ChannelScrapeResult {
        let mut results = ChannelScrapeResult::empty(channel);

        info!("Processing channel: {}", channel.name);

        let videos = match self
            .source
            .latest_videos(&channel.url, channel.max_videos)
            .await
        {
            Ok(videos) => videos,
            Err(e) => {
                let msg = format!("Error processing channel {}: {}", channel.name, e);
                error!("{}", msg);
                results.errors.push(msg);
                return results;
            }
        };

        results.videos_found = videos.len();
        if videos.is_empty() {
            warn!("No videos found for channel: {}", channel.name);
            return results;
        }

        for video in &videos {
            let outcome = self.process_video(video, channel, force_refresh).await;
            match outcome.status {
                VideoStatus::NewTranscript => results.new_transcripts += 1,
                VideoStatus::Cached => results.cached_transcripts += 1,
                VideoStatus::Error => {
                    if let Some(error) = &outcome.error {
                        results.errors.push(error.clone());
                    }
                }
                VideoStatus::NoTranscript => {}
            }
            results.processed_videos.push(outcome);
        }

        info!(
            "Channel processing complete: {} - {} new, {} cached",
            channel.name, results.new_transcripts, results.cached_transcripts
        );

        results
    }

    /// Check cache and database for one video, fetching its transcript when
    /// needed.
    async fn process_video(
        &self,
        video: &VideoListing,
        channel: &ChannelConfig,
        force_refresh: bool,
    ) -> VideoOutcome {
        let mut outcome = VideoOutcome {
            video_id: video.id.clone(),
            title: video.title.clone(),
            url: video.url.clone(),
            status: VideoStatus::Error,
            transcript_path: None,
            error: None,
        };

        // Skip as cached only when the DB row has a transcript path AND the
        // cache file still exists; either missing means re-fetch.
        if !force_refresh {
            match self.store.get_video_by_url(&video.url) {
                Ok(Some(existing)) if existing.transcript_path.is_some() => {
                    if self
                        .cache
                        .transcript_exists(&channel.cache_folder, &video.id, &video.title)
                    {
                        debug!("Video already cached: {}", video.title);
                        outcome.status = VideoStatus::Cached;
                        outcome.transcript_path = existing.transcript_path;
                        return outcome;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Database lookup failed for {}: {}", video.url, e);
                }
            }
        }

        info!("Fetching transcript for: {}", video.title);
        let transcript = match self
            .source
            .fetch_transcript(&video.url, &channel.language)
            .await
        {
            Ok(transcript) => transcript,
            Err(e) => {
                let msg = format!("Error processing video {}: {}", video.title, e);
                error!("{}", msg);
                outcome.error = Some(msg);
                return outcome;
            }
        };

        if !transcript.has_text() {
            warn!("No transcript available for: {}", video.title);
            outcome.status = VideoStatus::NoTranscript;
            outcome.error = transcript
                .metadata
                .error
                .clone()
                .or_else(|| Some("No transcript available".to_string()));

            // Still save to database to avoid re-checking on every run.
            let row = NewVideo {
                url: video.url.clone(),
                video_id: video.id.clone(),
                title: Some(video.title.clone()),
                channel_name: Some(channel.name.clone()),
                channel_url: Some(channel.url.clone()),
                language: Some(channel.language.clone()),
                source_type: None,
                total_entries: 0,
                fetched_at: Some(video.fetched_at.to_rfc3339()),
            };
            if let Err(e) = self.store.save_video(&row, None) {
                warn!("Failed to persist no-transcript row for {}: {}", video.url, e);
            }

            return outcome;
        }

        let transcript_path = match self.cache.save_transcript(
            &transcript,
            &channel.cache_folder,
            &video.id,
            &video.title,
        ) {
            Ok(path) => path,
            Err(e) => {
                let msg = format!("Failed to save transcript to cache: {}", e);
                error!("{}", msg);
                outcome.error = Some(msg);
                return outcome;
            }
        };

        let row = NewVideo {
            url: video.url.clone(),
            video_id: video.id.clone(),
            title: Some(video.title.clone()),
            channel_name: Some(channel.name.clone()),
            channel_url: Some(channel.url.clone()),
            language: Some(transcript.metadata.language.clone()),
            source_type: transcript.metadata.source_type.clone(),
            total_entries: transcript.metadata.total_entries as i64,
            fetched_at: Some(transcript.metadata.fetched_at.to_rfc3339()),
        };

        match self
            .store
            .save_video(&row, Some(&transcript_path.to_string_lossy()))
        {
            Ok(()) => {
                info!("Successfully processed video: {}", video.title);
                outcome.status = VideoStatus::NewTranscript;
                outcome.transcript_path = Some(transcript_path.to_string_lossy().to_string());
            }
            Err(e) => {
                let msg = format!("Failed to save to database: {}", e);
                error!("{}", msg);
                outcome.error = Some(msg);
            }
        }

        outcome
    }

    /// Process every active channel, isolating per-channel failures.
    pub async fn process_all_channels(&self, force_refresh: bool) -> ScrapeSummary {
        let mut summary = ScrapeSummary {
            total_channels: self.channels.len(),
            ..Default::default()
        };

        info!("Starting to process {} channels", self.channels.len());

        for channel in &self.channels {
            let result = self.process_channel(channel, force_refresh).await;
            summary.processed_channels += 1;
            summary.total_videos_found += result.videos_found;
            summary.total_new_transcripts += result.new_transcripts;
            summary.total_cached_transcripts += result.cached_transcripts;
            summary.total_errors += result.errors.len();
            summary.channel_results.push(result);
        }

        info!(
            "Finished processing all channels - {} new transcripts, {} cached, {} errors",
            summary.total_new_transcripts, summary.total_cached_transcripts, summary.total_errors
        );

        summary
    }

    /// Statistics for every active channel.
    pub fn channel_stats(&self) -> Vec<ChannelStats> {
        let mut stats = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let videos = self
                .store
                .get_videos_by_channel(&channel.url, None)
                .unwrap_or_default();
            let with_transcripts = videos
                .iter()
                .filter(|v| v.transcript_path.is_some())
                .count();
            let llm_processed = videos.iter().filter(|v| v.llm_processed).count();
            let summary_processed = videos.iter().filter(|v| v.summary_processed).count();
            let cache = self.cache.cache_stats(Some(&channel.cache_folder));

            stats.push(ChannelStats {
                name: channel.name.clone(),
                url: channel.url.clone(),
                enabled: channel.scrap,
                max_videos: channel.max_videos,
                language: channel.language.clone(),
                total_videos: videos.len(),
                videos_with_transcripts: with_transcripts,
                llm_processed,
                summary_processed,
                cache_files: cache.total_files,
                cache_size_mb: cache.total_size_mb,
            });
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarkError;
    use crate::transcript::TranscriptData;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Stub source: channel URLs map to canned listings; transcripts are
    /// synthesized unless the URL is marked as failing or captionless.
    struct StubSource {
        videos_per_channel: usize,
        failing_channels: Vec<String>,
        captionless_videos: Vec<String>,
    }

    impl StubSource {
        fn new(videos_per_channel: usize) -> Self {
            Self {
                videos_per_channel,
                failing_channels: Vec::new(),
                captionless_videos: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl TranscriptSource for StubSource {
        async fn latest_videos(
            &self,
            channel_url: &str,
            max_videos: usize,
        ) -> crate::error::Result<Vec<VideoListing>> {
            if self.failing_channels.iter().any(|c| c == channel_url) {
                return Err(HarkError::VideoSource("listing blew up".to_string()));
            }

            Ok((0..self.videos_per_channel.min(max_videos))
                .map(|i| {
                    let id = format!("{}vid{}", channel_url.rsplit('@').next().unwrap_or("x"), i);
                    VideoListing {
                        url: format!("https://www.youtube.com/watch?v={}", id),
                        id,
                        title: format!("Video {}", i),
                        channel_url: channel_url.to_string(),
                        fetched_at: Utc::now(),
                    }
                })
                .collect())
        }

        async fn fetch_transcript(
            &self,
            video_url: &str,
            language: &str,
        ) -> crate::error::Result<TranscriptData> {
            if self.captionless_videos.iter().any(|v| video_url.contains(v)) {
                return Ok(TranscriptData::unavailable(
                    "x",
                    "T",
                    language,
                    "No transcript available",
                ));
            }

            let mut data = TranscriptData::unavailable("x", "T", language, "");
            data.text = Some(format!("transcript for {}", video_url));
            data.metadata.error = None;
            data.metadata.source_type = Some("manual".to_string());
            data.metadata.total_entries = 1;
            Ok(data)
        }
    }

    fn test_settings(dir: &std::path::Path, channels: &[&str]) -> Settings {
        let mut settings = Settings::default();
        settings.youtube.channels = channels
            .iter()
            .map(|name| ChannelConfig {
                name: name.to_string(),
                scrap: true,
                url: format!("https://www.youtube.com/@{}", name),
                max_videos: 10,
                language: "en".to_string(),
                cache_folder: dir.join(name).to_string_lossy().to_string(),
                summary: Default::default(),
            })
            .collect();
        settings
    }

    fn build_manager(
        dir: &std::path::Path,
        channels: &[&str],
        source: StubSource,
    ) -> ChannelManager {
        let settings = test_settings(dir, channels);
        let store = Arc::new(VideoStore::in_memory().unwrap());
        let cache = Arc::new(TranscriptCache::new(dir.join("cache")).unwrap());
        ChannelManager::new(&settings, Arc::new(source), store, cache)
    }

    #[tokio::test]
    async fn test_new_transcripts_are_cached_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), &["alpha"], StubSource::new(2));

        let channel = manager.channels()[0].clone();
        let result = manager.process_channel(&channel, false).await;

        assert_eq!(result.videos_found, 2);
        assert_eq!(result.new_transcripts, 2);
        assert!(result.errors.is_empty());

        // A second pass sees everything cached.
        let result = manager.process_channel(&channel, false).await;
        assert_eq!(result.new_transcripts, 0);
        assert_eq!(result.cached_transcripts, 2);

        // Force refresh re-fetches regardless.
        let result = manager.process_channel(&channel, true).await;
        assert_eq!(result.new_transcripts, 2);
    }

    #[tokio::test]
    async fn test_no_transcript_rows_still_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = StubSource::new(1);
        source.captionless_videos.push("alphavid0".to_string());
        let manager = build_manager(dir.path(), &["alpha"], source);

        let channel = manager.channels()[0].clone();
        let result = manager.process_channel(&channel, false).await;

        assert_eq!(result.new_transcripts, 0);
        // Not treated as an error.
        assert!(result.errors.is_empty());
        assert_eq!(result.processed_videos[0].status, VideoStatus::NoTranscript);

        // The row exists so the video isn't re-checked as new forever.
        let record = manager
            .store
            .get_video_by_url("https://www.youtube.com/watch?v=alphavid0")
            .unwrap()
            .unwrap();
        assert!(record.transcript_path.is_none());
    }

    #[tokio::test]
    async fn test_channel_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = StubSource::new(1);
        source
            .failing_channels
            .push("https://www.youtube.com/@beta".to_string());
        let manager = build_manager(dir.path(), &["alpha", "beta", "gamma"], source);

        let summary = manager.process_all_channels(false).await;

        assert_eq!(summary.total_channels, 3);
        assert_eq!(summary.processed_channels, 3);
        // Channels 1 and 3 still produced results.
        assert_eq!(summary.total_new_transcripts, 2);
        assert_eq!(summary.total_errors, 1);
    }

    #[tokio::test]
    async fn test_stale_cache_file_triggers_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), &["alpha"], StubSource::new(1));
        let channel = manager.channels()[0].clone();

        let first = manager.process_channel(&channel, false).await;
        let path = first.processed_videos[0].transcript_path.clone().unwrap();

        // Delete the cache file behind the database's back.
        std::fs::remove_file(&path).unwrap();

        let second = manager.process_channel(&channel, false).await;
        assert_eq!(second.cached_transcripts, 0);
        assert_eq!(second.new_transcripts, 1);
    }

    #[tokio::test]
    async fn test_channel_stats() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_manager(dir.path(), &["alpha"], StubSource::new(2));
        let channel = manager.channels()[0].clone();
        manager.process_channel(&channel, false).await;

        let stats = manager.channel_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_videos, 2);
        assert_eq!(stats[0].videos_with_transcripts, 2);
        assert_eq!(stats[0].cache_files, 2);
    }
}
