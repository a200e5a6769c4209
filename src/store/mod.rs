//! SQLite-backed video/transcript/summary state.
//!
//! One table keyed by video URL tracks every video from discovery through
//! transcript fetch, summarization, and audio synthesis. All writes are
//! upsert-shaped: a read-by-url decides INSERT vs UPDATE, `created_at` is
//! set only on insert, and `updated_at` on every write.

use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// A persisted video row.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRecord {
    pub url: String,
    pub video_id: String,
    pub title: Option<String>,
    pub channel_name: Option<String>,
    pub channel_url: Option<String>,
    pub transcript_path: Option<String>,
    pub language: Option<String>,
    pub source_type: Option<String>,
    pub total_entries: i64,
    pub llm_processed: bool,
    pub summary_processed: bool,
    pub summary_text: Option<String>,
    pub summary_audio_path: Option<String>,
    pub summary_processed_at: Option<String>,
    pub summary_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub fetched_at: Option<String>,
}

/// Fields written when a video is discovered or its transcript refreshed.
#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub url: String,
    pub video_id: String,
    pub title: Option<String>,
    pub channel_name: Option<String>,
    pub channel_url: Option<String>,
    pub language: Option<String>,
    pub source_type: Option<String>,
    pub total_entries: i64,
    pub fetched_at: Option<String>,
}

/// Aggregate counts over the whole table.
#[derive(Debug, Clone, Serialize)]
pub struct VideoStats {
    pub total_videos: i64,
    pub videos_with_transcripts: i64,
    pub llm_processed: i64,
    pub unprocessed: i64,
    pub unique_channels: i64,
}

/// Aggregate counts for summary processing.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_with_transcripts: i64,
    pub summary_processed: i64,
    pub pending_summaries: i64,
    pub summary_errors: i64,
}

/// SQLite store for video state.
pub struct VideoStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT UNIQUE NOT NULL,
    video_id TEXT NOT NULL,
    title TEXT,
    channel_name TEXT,
    channel_url TEXT,
    transcript_path TEXT,
    language TEXT,
    source_type TEXT,
    total_entries INTEGER DEFAULT 0,
    llm_processed BOOLEAN DEFAULT FALSE,
    summary_processed BOOLEAN DEFAULT FALSE,
    summary_text TEXT,
    summary_audio_path TEXT,
    summary_processed_at TEXT,
    summary_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    fetched_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_videos_video_id ON videos(video_id);
CREATE INDEX IF NOT EXISTS idx_videos_channel_url ON videos(channel_url);
"#;

const COLUMNS: &str = "url, video_id, title, channel_name, channel_url, transcript_path, \
    language, source_type, total_entries, llm_processed, summary_processed, summary_text, \
    summary_audio_path, summary_processed_at, summary_error, created_at, updated_at, fetched_at";

fn map_record(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        url: row.get(0)?,
        video_id: row.get(1)?,
        title: row.get(2)?,
        channel_name: row.get(3)?,
        channel_url: row.get(4)?,
        transcript_path: row.get(5)?,
        language: row.get(6)?,
        source_type: row.get(7)?,
        total_entries: row.get(8)?,
        llm_processed: row.get(9)?,
        summary_processed: row.get(10)?,
        summary_text: row.get(11)?,
        summary_audio_path: row.get(12)?,
        summary_processed_at: row.get(13)?,
        summary_error: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        fetched_at: row.get(17)?,
    })
}

impl VideoStore {
    /// Open (or create) the store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized video store at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means another thread panicked mid-statement;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a video URL is already tracked.
    pub fn video_exists(&self, video_url: &str) -> Result<bool> {
        let conn = self.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM videos WHERE url = ?1 LIMIT 1",
                params![video_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Fetch the full row for a video URL.
    pub fn get_video_by_url(&self, video_url: &str) -> Result<Option<VideoRecord>> {
        let conn = self.lock();
        let record = conn
            .query_row(
                &format!("SELECT {} FROM videos WHERE url = ?1", COLUMNS),
                params![video_url],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Insert or update a video row.
    ///
    /// `created_at` is set only on insert; `updated_at` refreshes on every
    /// write. Summary fields are never touched here.
    #[instrument(skip(self, video), fields(url = %video.url))]
    pub fn save_video(&self, video: &NewVideo, transcript_path: Option<&str>) -> Result<()> {
        let exists = self.video_exists(&video.url)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();

        if exists {
            conn.execute(
                r#"
                UPDATE videos
                SET title = ?1, channel_name = ?2, channel_url = ?3,
                    transcript_path = ?4, language = ?5, source_type = ?6,
                    total_entries = ?7, updated_at = ?8, fetched_at = ?9
                WHERE url = ?10
                "#,
                params![
                    video.title,
                    video.channel_name,
                    video.channel_url,
                    transcript_path,
                    video.language,
                    video.source_type,
                    video.total_entries,
                    now,
                    video.fetched_at,
                    video.url,
                ],
            )?;
            debug!("Updated existing video record: {}", video.url);
        } else {
            conn.execute(
                r#"
                INSERT INTO videos
                (url, video_id, title, channel_name, channel_url, transcript_path,
                 language, source_type, total_entries, created_at, updated_at, fetched_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    video.url,
                    video.video_id,
                    video.title,
                    video.channel_name,
                    video.channel_url,
                    transcript_path,
                    video.language,
                    video.source_type,
                    video.total_entries,
                    now,
                    now,
                    video.fetched_at,
                ],
            )?;
            debug!("Inserted new video record: {}", video.url);
        }

        Ok(())
    }

    /// All videos for a channel, newest first.
    pub fn get_videos_by_channel(
        &self,
        channel_url: &str,
        limit: Option<usize>,
    ) -> Result<Vec<VideoRecord>> {
        let conn = self.lock();
        let mut sql = format!(
            "SELECT {} FROM videos WHERE channel_url = ?1 ORDER BY created_at DESC",
            COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![channel_url], map_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Mark a video as processed (or not) by the LLM stage.
    pub fn mark_llm_processed(&self, video_url: &str, processed: bool) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE videos SET llm_processed = ?1, updated_at = ?2 WHERE url = ?3",
            params![processed, Utc::now().to_rfc3339(), video_url],
        )?;
        debug!("Marked video as LLM processed: {}", video_url);
        Ok(())
    }

    /// Videos with a transcript that the LLM stage hasn't touched, oldest first.
    pub fn get_unprocessed_videos(&self, limit: Option<usize>) -> Result<Vec<VideoRecord>> {
        let conn = self.lock();
        let mut sql = format!(
            "SELECT {} FROM videos \
             WHERE llm_processed = FALSE AND transcript_path IS NOT NULL \
             ORDER BY created_at ASC, id ASC",
            COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Videos eligible for summarization, oldest first (FIFO).
    ///
    /// Eligible means: transcript present, not yet summary-processed.
    pub fn get_unsummarized_videos(
        &self,
        channel_url: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<VideoRecord>> {
        let conn = self.lock();
        let mut sql = format!(
            "SELECT {} FROM videos \
             WHERE summary_processed = FALSE AND transcript_path IS NOT NULL",
            COLUMNS
        );
        if channel_url.is_some() {
            sql.push_str(" AND channel_url = ?1");
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = match channel_url {
            Some(channel) => stmt.query_map(params![channel], map_record)?,
            None => stmt.query_map([], map_record)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Record a completed summary: text, audio path, timestamp; clears any
    /// prior summary error.
    pub fn mark_summary_processed(
        &self,
        video_url: &str,
        summary_text: &str,
        audio_path: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock();
        conn.execute(
            r#"
            UPDATE videos
            SET summary_processed = TRUE, summary_text = ?1, summary_audio_path = ?2,
                summary_processed_at = ?3, summary_error = NULL, updated_at = ?4
            WHERE url = ?5
            "#,
            params![summary_text, audio_path, now, now, video_url],
        )?;
        debug!("Marked video as summary processed: {}", video_url);
        Ok(())
    }

    /// Record a failed summary attempt without altering `summary_processed`.
    pub fn mark_summary_error(&self, video_url: &str, error_message: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE videos SET summary_error = ?1, updated_at = ?2 WHERE url = ?3",
            params![error_message, Utc::now().to_rfc3339(), video_url],
        )?;
        debug!("Marked video summary error: {}", video_url);
        Ok(())
    }

    /// Videos whose last summary attempt failed, most recently updated first.
    pub fn get_failed_summaries(&self, limit: Option<usize>) -> Result<Vec<VideoRecord>> {
        let conn = self.lock();
        let mut sql = format!(
            "SELECT {} FROM videos \
             WHERE summary_error IS NOT NULL AND transcript_path IS NOT NULL \
             ORDER BY updated_at DESC",
            COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Aggregate table statistics, computed on demand.
    pub fn video_stats(&self) -> Result<VideoStats> {
        let conn = self.lock();
        let total_videos: i64 =
            conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
        let videos_with_transcripts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE transcript_path IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        let llm_processed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE llm_processed = TRUE",
            [],
            |row| row.get(0),
        )?;
        let unique_channels: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT channel_url) FROM videos",
            [],
            |row| row.get(0),
        )?;

        Ok(VideoStats {
            total_videos,
            videos_with_transcripts,
            llm_processed,
            unprocessed: videos_with_transcripts - llm_processed,
            unique_channels,
        })
    }

    /// Aggregate summary-processing statistics, computed on demand.
    pub fn summary_stats(&self) -> Result<SummaryStats> {
        let conn = self.lock();
        let total_with_transcripts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE transcript_path IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        let summary_processed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE summary_processed = TRUE",
            [],
            |row| row.get(0),
        )?;
        let summary_errors: i64 = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE summary_error IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(SummaryStats {
            total_with_transcripts,
            summary_processed,
            pending_summaries: total_with_transcripts - summary_processed,
            summary_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video(url: &str, channel_url: &str) -> NewVideo {
        NewVideo {
            url: url.to_string(),
            video_id: url.rsplit('=').next().unwrap_or("vid").to_string(),
            title: Some("Test Video".to_string()),
            channel_name: Some("Test Channel".to_string()),
            channel_url: Some(channel_url.to_string()),
            language: Some("en".to_string()),
            source_type: Some("manual".to_string()),
            total_entries: 42,
            fetched_at: Some("2026-08-01T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = VideoStore::in_memory().unwrap();
        let url = "https://www.youtube.com/watch?v=abc";
        let mut video = sample_video(url, "https://www.youtube.com/@chan");

        store.save_video(&video, Some("/cache/abc.json")).unwrap();
        let first = store.get_video_by_url(url).unwrap().unwrap();

        video.title = Some("Updated Title".to_string());
        store.save_video(&video, Some("/cache/abc.json")).unwrap();

        let second = store.get_video_by_url(url).unwrap().unwrap();
        assert_eq!(second.title.as_deref(), Some("Updated Title"));
        // created_at survives the second save; updated_at moves forward.
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let stats = store.video_stats().unwrap();
        assert_eq!(stats.total_videos, 1);
    }

    #[test]
    fn test_summary_state_exclusivity() {
        let store = VideoStore::in_memory().unwrap();
        let url = "https://www.youtube.com/watch?v=abc";
        store
            .save_video(
                &sample_video(url, "https://www.youtube.com/@chan"),
                Some("/cache/abc.json"),
            )
            .unwrap();

        store.mark_summary_error(url, "TTS conversion failed").unwrap();
        let failed = store.get_video_by_url(url).unwrap().unwrap();
        assert!(!failed.summary_processed);
        assert!(failed.summary_error.is_some());

        // A successful retry clears the previous error.
        store
            .mark_summary_processed(url, "A summary", Some("/audio/abc.wav"))
            .unwrap();
        let processed = store.get_video_by_url(url).unwrap().unwrap();
        assert!(processed.summary_processed);
        assert!(processed.summary_error.is_none());
        assert_eq!(processed.summary_text.as_deref(), Some("A summary"));
        assert_eq!(
            processed.summary_audio_path.as_deref(),
            Some("/audio/abc.wav")
        );
        assert!(processed.summary_processed_at.is_some());
    }

    #[test]
    fn test_unsummarized_is_fifo_and_filtered() {
        let store = VideoStore::in_memory().unwrap();
        let chan_a = "https://www.youtube.com/@a";
        let chan_b = "https://www.youtube.com/@b";

        for (i, chan) in [(1, chan_a), (2, chan_b), (3, chan_a)] {
            let url = format!("https://www.youtube.com/watch?v=v{}", i);
            store
                .save_video(&sample_video(&url, chan), Some("/cache/x.json"))
                .unwrap();
        }
        // A video without a transcript path is not eligible.
        store
            .save_video(
                &sample_video("https://www.youtube.com/watch?v=v4", chan_a),
                None,
            )
            .unwrap();

        let all = store.get_unsummarized_videos(None, None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].url.ends_with("v1"));
        assert!(all[2].url.ends_with("v3"));

        let only_a = store.get_unsummarized_videos(Some(chan_a), None).unwrap();
        assert_eq!(only_a.len(), 2);

        let limited = store.get_unsummarized_videos(None, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert!(limited[0].url.ends_with("v1"));
    }

    #[test]
    fn test_processed_videos_leave_the_queue() {
        let store = VideoStore::in_memory().unwrap();
        let url = "https://www.youtube.com/watch?v=abc";
        store
            .save_video(
                &sample_video(url, "https://www.youtube.com/@chan"),
                Some("/cache/abc.json"),
            )
            .unwrap();

        assert_eq!(store.get_unsummarized_videos(None, None).unwrap().len(), 1);
        store.mark_summary_processed(url, "done", None).unwrap();
        assert!(store.get_unsummarized_videos(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_failed_summaries_query() {
        let store = VideoStore::in_memory().unwrap();
        let chan = "https://www.youtube.com/@chan";
        for i in 1..=2 {
            let url = format!("https://www.youtube.com/watch?v=v{}", i);
            store
                .save_video(&sample_video(&url, chan), Some("/cache/x.json"))
                .unwrap();
        }

        store
            .mark_summary_error("https://www.youtube.com/watch?v=v1", "LLM generation failed")
            .unwrap();

        let failed = store.get_failed_summaries(None).unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].url.ends_with("v1"));

        let stats = store.summary_stats().unwrap();
        assert_eq!(stats.summary_errors, 1);
        assert_eq!(stats.pending_summaries, 2);
    }

    #[test]
    fn test_videos_by_channel_newest_first() {
        let store = VideoStore::in_memory().unwrap();
        let chan = "https://www.youtube.com/@chan";
        for i in 1..=3 {
            let url = format!("https://www.youtube.com/watch?v=v{}", i);
            store
                .save_video(&sample_video(&url, chan), Some("/cache/x.json"))
                .unwrap();
        }

        let videos = store.get_videos_by_channel(chan, Some(2)).unwrap();
        assert_eq!(videos.len(), 2);
        // Ties on created_at resolve arbitrarily, but the full set is bounded.
        assert_eq!(store.get_videos_by_channel(chan, None).unwrap().len(), 3);
    }

    #[test]
    fn test_llm_processing_queue() {
        let store = VideoStore::in_memory().unwrap();
        let url = "https://www.youtube.com/watch?v=abc";
        store
            .save_video(
                &sample_video(url, "https://www.youtube.com/@chan"),
                Some("/cache/abc.json"),
            )
            .unwrap();

        assert_eq!(store.get_unprocessed_videos(None).unwrap().len(), 1);
        store.mark_llm_processed(url, true).unwrap();
        assert!(store.get_unprocessed_videos(None).unwrap().is_empty());

        let stats = store.video_stats().unwrap();
        assert_eq!(stats.llm_processed, 1);
        assert_eq!(stats.unprocessed, 0);
    }
}
