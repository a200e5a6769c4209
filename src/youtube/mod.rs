//! YouTube integration: video listing, transcript fetching, and channel
//! scraping.

pub mod channels;
mod fetcher;

pub use channels::{ChannelManager, ChannelScrapeResult, ScrapeSummary, VideoOutcome, VideoStatus};
pub use fetcher::YtDlpFetcher;

use crate::error::Result;
use crate::transcript::{TranscriptData, VideoListing};
use async_trait::async_trait;

/// External collaborator seam for listing videos and fetching transcripts.
///
/// The production implementation shells out to yt-dlp; tests substitute
/// stubs.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Latest uploads for a channel, newest first, bounded by `max_videos`.
    async fn latest_videos(
        &self,
        channel_url: &str,
        max_videos: usize,
    ) -> Result<Vec<VideoListing>>;

    /// Fetch the transcript for a single video.
    ///
    /// A video with no usable captions yields an error-tagged
    /// [`TranscriptData`] (text `None`, `metadata.error` set), not an `Err`;
    /// `Err` is reserved for tool and network failures.
    async fn fetch_transcript(&self, video_url: &str, language: &str) -> Result<TranscriptData>;
}
