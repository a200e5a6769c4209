//! Filesystem cache for fetched transcripts.
//!
//! Transcripts are stored as JSON files at a deterministic path derived
//! from the channel's cache folder, the video id, and a sanitized title.
//! The cache makes no attempt to coordinate with the database; callers are
//! responsible for detecting drift between a recorded path and the
//! filesystem's actual state.

use crate::error::{HarkError, Result};
use crate::transcript::{CachedTranscript, TranscriptData};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Maximum length of a sanitized filename stem.
const MAX_FILENAME_LEN: usize = 200;

/// Cache usage statistics for a folder.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_mb: f64,
    pub cache_dir: String,
    pub exists: bool,
}

/// Filesystem-backed transcript cache.
pub struct TranscriptCache {
    base_dir: PathBuf,
}

impl TranscriptCache {
    /// Create a cache rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        debug!("Cache directory ensured: {}", base_dir.display());
        Ok(Self { base_dir })
    }

    /// Root directory of the cache.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Replace filesystem-hostile characters and bound the length.
    fn sanitize_filename(filename: &str) -> String {
        let cleaned: String = filename
            .chars()
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
                other => other,
            })
            .collect();

        cleaned.trim().chars().take(MAX_FILENAME_LEN).collect()
    }

    /// Deterministic cache file path for a video transcript.
    ///
    /// Creates the channel directory as a side effect so a later save
    /// cannot fail on a missing parent.
    pub fn cache_path(
        &self,
        channel_cache_folder: &str,
        video_id: &str,
        title: &str,
    ) -> Result<PathBuf> {
        let channel_dir = PathBuf::from(channel_cache_folder);
        std::fs::create_dir_all(&channel_dir)?;

        let title = if title.is_empty() { "untitled" } else { title };
        let filename = format!(
            "{}_{}.json",
            video_id,
            Self::sanitize_filename(title)
        );
        Ok(channel_dir.join(filename))
    }

    /// Whether a transcript file already exists in the cache.
    pub fn transcript_exists(
        &self,
        channel_cache_folder: &str,
        video_id: &str,
        title: &str,
    ) -> bool {
        match self.cache_path(channel_cache_folder, video_id, title) {
            Ok(path) => {
                let exists = path.is_file();
                if exists {
                    debug!("Transcript cache file exists: {}", path.display());
                }
                exists
            }
            Err(e) => {
                error!("Error checking transcript cache existence: {}", e);
                false
            }
        }
    }

    /// Save transcript data, returning the path it was written to.
    pub fn save_transcript(
        &self,
        transcript: &TranscriptData,
        channel_cache_folder: &str,
        video_id: &str,
        title: &str,
    ) -> Result<PathBuf> {
        let path = self.cache_path(channel_cache_folder, video_id, title)?;

        let envelope = CachedTranscript {
            cached_at: Utc::now(),
            video_id: video_id.to_string(),
            title: title.to_string(),
            cache_path: path.to_string_lossy().to_string(),
            transcript: transcript.clone(),
        };

        let content = serde_json::to_string_pretty(&envelope)?;
        std::fs::write(&path, content)?;

        info!("Transcript saved to cache: {}", path.display());
        Ok(path)
    }

    /// Load a transcript by its cache coordinates; `None` when absent.
    pub fn load_transcript(
        &self,
        channel_cache_folder: &str,
        video_id: &str,
        title: &str,
    ) -> Result<Option<TranscriptData>> {
        let path = self.cache_path(channel_cache_folder, video_id, title)?;
        self.load_transcript_by_path(&path)
    }

    /// Load a transcript from a specific cache file path.
    ///
    /// A missing file yields `Ok(None)` — the record pointing at it has
    /// gone stale; an unreadable or malformed file is an error.
    pub fn load_transcript_by_path(&self, cache_path: &Path) -> Result<Option<TranscriptData>> {
        if !cache_path.exists() {
            warn!("Cache file not found: {}", cache_path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(cache_path)?;
        let envelope: CachedTranscript = serde_json::from_str(&content).map_err(|e| {
            HarkError::Cache(format!(
                "Malformed cache file {}: {}",
                cache_path.display(),
                e
            ))
        })?;

        debug!("Transcript loaded from cache: {}", cache_path.display());
        Ok(Some(envelope.transcript))
    }

    /// Delete a cached transcript; returns whether a file was removed.
    pub fn delete_transcript(
        &self,
        channel_cache_folder: &str,
        video_id: &str,
        title: &str,
    ) -> Result<bool> {
        let path = self.cache_path(channel_cache_folder, video_id, title)?;

        if path.exists() {
            std::fs::remove_file(&path)?;
            info!("Transcript deleted from cache: {}", path.display());
            Ok(true)
        } else {
            warn!("Cache file not found for deletion: {}", path.display());
            Ok(false)
        }
    }

    /// Count files and bytes under a cache folder (or the whole cache).
    pub fn cache_stats(&self, channel_cache_folder: Option<&str>) -> CacheStats {
        let cache_dir = match channel_cache_folder {
            Some(folder) => PathBuf::from(folder),
            None => self.base_dir.clone(),
        };

        if !cache_dir.exists() {
            return CacheStats {
                total_files: 0,
                total_size_mb: 0.0,
                cache_dir: cache_dir.to_string_lossy().to_string(),
                exists: false,
            };
        }

        let mut total_files = 0usize;
        let mut total_size = 0u64;
        let mut pending = vec![cache_dir.clone()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    total_files += 1;
                    total_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }

        CacheStats {
            total_files,
            total_size_mb: (total_size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            cache_dir: cache_dir.to_string_lossy().to_string(),
            exists: true,
        }
    }

    /// Remove empty directories under the cache root, deepest first.
    ///
    /// Housekeeping only; failures are logged and skipped.
    pub fn cleanup_empty_directories(&self) -> usize {
        let mut dirs = Vec::new();
        let mut pending = vec![self.base_dir.clone()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path.clone());
                    pending.push(path);
                }
            }
        }

        // Deepest first so a parent emptied by a child removal also goes.
        dirs.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

        let mut removed = 0;
        for dir in dirs {
            let is_empty = std::fs::read_dir(&dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty {
                match std::fs::remove_dir(&dir) {
                    Ok(()) => {
                        removed += 1;
                        debug!("Removed empty directory: {}", dir.display());
                    }
                    Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
                }
            }
        }

        if removed > 0 {
            info!("Cleaned up {} empty directories", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptData;

    fn sample_transcript() -> TranscriptData {
        let mut data = TranscriptData::unavailable("abc123", "A Title", "en", "placeholder");
        data.text = Some("hello world".to_string());
        data.metadata.error = None;
        data.metadata.source_type = Some("manual".to_string());
        data
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            TranscriptCache::sanitize_filename("What? A/B\\C: \"quoted\"*"),
            "What_ A_B_C_ _quoted__"
        );

        let long = "x".repeat(500);
        assert_eq!(TranscriptCache::sanitize_filename(&long).len(), 200);

        assert_eq!(TranscriptCache::sanitize_filename("  padded  "), "padded");
    }

    #[test]
    fn test_cache_path_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path()).unwrap();
        let folder = dir.path().join("chan").to_string_lossy().to_string();

        let a = cache.cache_path(&folder, "abc123", "My Video").unwrap();
        let b = cache.cache_path(&folder, "abc123", "My Video").unwrap();
        assert_eq!(a, b);
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("abc123_My Video"));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path()).unwrap();
        let folder = dir.path().join("chan").to_string_lossy().to_string();

        let saved_path = cache
            .save_transcript(&sample_transcript(), &folder, "abc123", "A Title")
            .unwrap();
        assert!(cache.transcript_exists(&folder, "abc123", "A Title"));

        let loaded = cache
            .load_transcript_by_path(&saved_path)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.text.as_deref(), Some("hello world"));
        assert_eq!(loaded.metadata.video_id, "abc123");
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path()).unwrap();

        let loaded = cache
            .load_transcript_by_path(&dir.path().join("nope.json"))
            .unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path()).unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(cache.load_transcript_by_path(&path).is_err());
    }

    #[test]
    fn test_delete_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path()).unwrap();
        let folder = dir.path().join("chan").to_string_lossy().to_string();

        cache
            .save_transcript(&sample_transcript(), &folder, "abc123", "T")
            .unwrap();
        assert!(cache.delete_transcript(&folder, "abc123", "T").unwrap());
        assert!(!cache.delete_transcript(&folder, "abc123", "T").unwrap());
    }

    #[test]
    fn test_cache_stats_counts_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path()).unwrap();
        let folder = dir.path().join("chan").to_string_lossy().to_string();

        cache
            .save_transcript(&sample_transcript(), &folder, "a", "One")
            .unwrap();
        cache
            .save_transcript(&sample_transcript(), &folder, "b", "Two")
            .unwrap();
        std::fs::write(dir.path().join("chan/notes.txt"), "ignored").unwrap();

        let stats = cache.cache_stats(None);
        assert!(stats.exists);
        assert_eq!(stats.total_files, 2);

        let missing = cache.cache_stats(Some("/definitely/not/here"));
        assert!(!missing.exists);
        assert_eq!(missing.total_files, 0);
    }

    #[test]
    fn test_cleanup_empty_directories_deepest_first() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranscriptCache::new(dir.path()).unwrap();

        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::create_dir_all(dir.path().join("keep")).unwrap();
        std::fs::write(dir.path().join("keep/file.json"), "{}").unwrap();

        let removed = cache.cleanup_empty_directories();
        // a/b/c, a/b, and a are all empty once their children are gone.
        assert_eq!(removed, 3);
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("keep").exists());
    }
}
