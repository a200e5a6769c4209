//! Transcript data model shared by the fetcher, cache, and pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fetched transcript with full text, timed entries, and metadata.
///
/// When no transcript is available the fetcher still returns one of these
/// with `text = None` and `metadata.error` set, so callers can persist the
/// "no transcript" outcome instead of retrying on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptData {
    pub text: Option<String>,
    #[serde(default)]
    pub entries: Vec<TranscriptEntry>,
    pub metadata: TranscriptMetadata,
}

impl TranscriptData {
    /// Whether this transcript carries usable text.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Build the error-tagged variant for a video with no usable captions.
    pub fn unavailable(video_id: &str, title: &str, language: &str, reason: &str) -> Self {
        Self {
            text: None,
            entries: Vec::new(),
            metadata: TranscriptMetadata {
                video_id: video_id.to_string(),
                title: title.to_string(),
                language: language.to_string(),
                source_type: None,
                total_entries: 0,
                available_languages: Vec::new(),
                fetched_at: Utc::now(),
                error: Some(reason.to_string()),
            },
        }
    }
}

/// A single timed caption entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Start offset in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub text: String,
}

/// Metadata describing where a transcript came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    pub video_id: String,
    pub title: String,
    pub language: String,
    /// "manual" or "automatic" captions; None when unavailable.
    pub source_type: Option<String>,
    pub total_entries: usize,
    #[serde(default)]
    pub available_languages: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// On-disk cache envelope wrapping a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTranscript {
    pub cached_at: DateTime<Utc>,
    pub video_id: String,
    pub title: String,
    pub cache_path: String,
    pub transcript: TranscriptData,
}

/// A video discovered by listing a channel's latest uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoListing {
    pub id: String,
    pub url: String,
    pub title: String,
    pub channel_url: String,
    pub fetched_at: DateTime<Utc>,
}
