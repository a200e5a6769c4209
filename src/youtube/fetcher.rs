//! yt-dlp-backed implementation of [`TranscriptSource`].

use super::TranscriptSource;
use crate::error::{HarkError, Result};
use crate::transcript::{TranscriptData, TranscriptEntry, TranscriptMetadata, VideoListing};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

/// Fetches video listings and transcripts through the yt-dlp binary.
pub struct YtDlpFetcher {
    http: reqwest::Client,
    video_id_regex: Regex,
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        // Matches various YouTube URL formats and bare video IDs
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex");

        Self {
            http: reqwest::Client::new(),
            video_id_regex,
        }
    }

    /// Extract a video ID from a YouTube URL or bare ID.
    fn extract_video_id(&self, input: &str) -> Option<String> {
        let caps = self.video_id_regex.captures(input.trim())?;
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    async fn run_ytdlp(args: &[&str]) -> Result<std::process::Output> {
        tokio::process::Command::new("yt-dlp")
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HarkError::ToolNotFound("yt-dlp".to_string())
                } else {
                    HarkError::VideoSource(format!("Failed to run yt-dlp: {}", e))
                }
            })
    }

    /// Pick the caption track for a language, preferring manual subtitles
    /// over automatic captions, falling back to English.
    fn select_caption_track<'a>(
        info: &'a serde_json::Value,
        language: &str,
    ) -> (Option<&'a serde_json::Value>, Option<&'static str>, String) {
        let subtitles = &info["subtitles"];
        let automatic = &info["automatic_captions"];

        if subtitles[language].is_array() {
            (Some(&subtitles[language]), Some("manual"), language.to_string())
        } else if automatic[language].is_array() {
            (
                Some(&automatic[language]),
                Some("automatic"),
                language.to_string(),
            )
        } else if language != "en" && subtitles["en"].is_array() {
            (Some(&subtitles["en"]), Some("manual"), "en".to_string())
        } else if language != "en" && automatic["en"].is_array() {
            (Some(&automatic["en"]), Some("automatic"), "en".to_string())
        } else {
            (None, None, language.to_string())
        }
    }

    /// URL of the json3-formatted payload within a caption track list.
    fn json3_url(track: &serde_json::Value) -> Option<String> {
        track.as_array()?.iter().find_map(|format| {
            if format["ext"].as_str() == Some("json3") {
                format["url"].as_str().map(|s| s.to_string())
            } else {
                None
            }
        })
    }

    /// Fold a json3 caption payload into timed entries plus full text.
    fn parse_json3(payload: &serde_json::Value) -> (Vec<TranscriptEntry>, String) {
        let mut entries = Vec::new();
        let mut text_parts = Vec::new();

        if let Some(events) = payload["events"].as_array() {
            for event in events {
                let Some(segs) = event["segs"].as_array() else {
                    continue;
                };
                let text: String = segs
                    .iter()
                    .filter_map(|seg| seg["utf8"].as_str())
                    .collect::<String>()
                    .trim()
                    .to_string();
                if text.is_empty() {
                    continue;
                }

                let start = event["tStartMs"].as_f64().unwrap_or(0.0) / 1000.0;
                let duration = event["dDurationMs"].as_f64().unwrap_or(0.0) / 1000.0;

                text_parts.push(text.clone());
                entries.push(TranscriptEntry {
                    start,
                    duration,
                    text,
                });
            }
        }

        (entries, text_parts.join(" "))
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptSource for YtDlpFetcher {
    async fn latest_videos(
        &self,
        channel_url: &str,
        max_videos: usize,
    ) -> Result<Vec<VideoListing>> {
        let listing_url = if channel_url.ends_with("/videos") {
            channel_url.to_string()
        } else {
            format!("{}/videos", channel_url)
        };

        let output = Self::run_ytdlp(&[
            "--dump-json",
            "--no-download",
            "--no-warnings",
            "--flat-playlist",
            "--playlist-end",
            &max_videos.to_string(),
            &listing_url,
        ])
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarkError::VideoSource(format!(
                "Failed to list videos for {}: {}",
                channel_url, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let base_channel_url = listing_url.trim_end_matches("/videos").to_string();
        let mut videos = Vec::new();

        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(json) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };

            let id = json["id"]
                .as_str()
                .map(|s| s.to_string())
                .or_else(|| json["url"].as_str().and_then(|u| self.extract_video_id(u)));
            let Some(id) = id else { continue };

            videos.push(VideoListing {
                url: format!("https://www.youtube.com/watch?v={}", id),
                id,
                title: json["title"].as_str().unwrap_or("Untitled").to_string(),
                channel_url: base_channel_url.clone(),
                fetched_at: Utc::now(),
            });

            if videos.len() >= max_videos {
                break;
            }
        }

        info!("Found {} latest videos from channel", videos.len());
        Ok(videos)
    }

    async fn fetch_transcript(&self, video_url: &str, language: &str) -> Result<TranscriptData> {
        let output = Self::run_ytdlp(&[
            "--dump-json",
            "--no-download",
            "--no-warnings",
            video_url,
        ])
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarkError::VideoSource(format!(
                "Could not extract video info for {}: {}",
                video_url, stderr
            )));
        }

        let info: serde_json::Value =
            serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).map_err(|e| {
                HarkError::VideoSource(format!("Failed to parse yt-dlp output: {}", e))
            })?;

        let video_id = info["id"].as_str().unwrap_or_default().to_string();
        let title = info["title"].as_str().unwrap_or("Untitled").to_string();

        let mut available_languages: Vec<String> = Vec::new();
        for key in ["subtitles", "automatic_captions"] {
            if let Some(map) = info[key].as_object() {
                available_languages.extend(map.keys().cloned());
            }
        }

        let (track, source_type, resolved_language) = Self::select_caption_track(&info, language);

        let Some(track) = track else {
            warn!("No transcript available for: {}", title);
            let mut data =
                TranscriptData::unavailable(&video_id, &title, language, "No transcript available");
            data.metadata.available_languages = available_languages;
            return Ok(data);
        };

        let Some(url) = Self::json3_url(track) else {
            let mut data = TranscriptData::unavailable(
                &video_id,
                &title,
                &resolved_language,
                "Caption track has no json3 format",
            );
            data.metadata.available_languages = available_languages;
            return Ok(data);
        };

        debug!("Downloading caption payload for {}", video_id);
        let payload: serde_json::Value = self.http.get(&url).send().await?.json().await?;
        let (entries, text) = Self::parse_json3(&payload);

        if text.is_empty() {
            let mut data = TranscriptData::unavailable(
                &video_id,
                &title,
                &resolved_language,
                "Caption payload was empty",
            );
            data.metadata.available_languages = available_languages;
            return Ok(data);
        }

        let total_entries = entries.len();
        Ok(TranscriptData {
            text: Some(text),
            entries,
            metadata: TranscriptMetadata {
                video_id,
                title,
                language: resolved_language,
                source_type: source_type.map(|s| s.to_string()),
                total_entries,
                available_languages,
                fetched_at: Utc::now(),
                error: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_video_id() {
        let fetcher = YtDlpFetcher::new();

        assert_eq!(
            fetcher.extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            fetcher.extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            fetcher.extract_video_id("dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(fetcher.extract_video_id("not-a-video-id"), None);
    }

    #[test]
    fn test_select_caption_track_prefers_manual() {
        let info = json!({
            "subtitles": {"en": [{"ext": "json3", "url": "https://example.com/manual"}]},
            "automatic_captions": {"en": [{"ext": "json3", "url": "https://example.com/auto"}]},
        });

        let (track, source_type, language) = YtDlpFetcher::select_caption_track(&info, "en");
        assert!(track.is_some());
        assert_eq!(source_type, Some("manual"));
        assert_eq!(language, "en");
    }

    #[test]
    fn test_select_caption_track_falls_back_to_english() {
        let info = json!({
            "subtitles": {},
            "automatic_captions": {"en": [{"ext": "json3", "url": "https://example.com/auto"}]},
        });

        let (track, source_type, language) = YtDlpFetcher::select_caption_track(&info, "de");
        assert!(track.is_some());
        assert_eq!(source_type, Some("automatic"));
        assert_eq!(language, "en");
    }

    #[test]
    fn test_select_caption_track_none_available() {
        let info = json!({"subtitles": {}, "automatic_captions": {}});
        let (track, source_type, _) = YtDlpFetcher::select_caption_track(&info, "en");
        assert!(track.is_none());
        assert!(source_type.is_none());
    }

    #[test]
    fn test_json3_url_selection() {
        let track = json!([
            {"ext": "vtt", "url": "https://example.com/vtt"},
            {"ext": "json3", "url": "https://example.com/json3"},
        ]);
        assert_eq!(
            YtDlpFetcher::json3_url(&track),
            Some("https://example.com/json3".to_string())
        );

        let no_json3 = json!([{"ext": "vtt", "url": "https://example.com/vtt"}]);
        assert_eq!(YtDlpFetcher::json3_url(&no_json3), None);
    }

    #[test]
    fn test_parse_json3_folds_segments() {
        let payload = json!({
            "events": [
                {"tStartMs": 0, "dDurationMs": 1500, "segs": [{"utf8": "hello "}, {"utf8": "world"}]},
                {"tStartMs": 1500, "dDurationMs": 500, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 2000, "dDurationMs": 1000, "segs": [{"utf8": "again"}]},
            ]
        });

        let (entries, text) = YtDlpFetcher::parse_json3(&payload);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "hello world");
        assert_eq!(entries[0].start, 0.0);
        assert_eq!(entries[0].duration, 1.5);
        assert_eq!(entries[1].start, 2.0);
        assert_eq!(text, "hello world again");
    }
}
