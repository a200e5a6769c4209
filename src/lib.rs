//! Hark - YouTube Channel Audio Summaries
//!
//! A CLI tool that turns YouTube channel uploads into spoken audio summaries.
//!
//! # Overview
//!
//! Hark allows you to:
//! - Track YouTube channels and fetch transcripts for their latest uploads
//! - Summarize transcripts with a configurable LLM provider
//! - Synthesize summaries into audio with a configurable TTS provider
//! - Deliver the result through notification providers (Telegram, desktop)
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `provider` - Shared provider-instance plumbing (status, lazy backends)
//! - `llm` - LLM providers and dispatch
//! - `tts` - Text-to-speech providers and dispatch
//! - `notify` - Notification providers and dispatch
//! - `store` - Video/transcript/summary state in SQLite
//! - `cache` - Filesystem transcript cache
//! - `youtube` - Channel scraping and transcript fetching
//! - `summary` - The transcript -> summary -> audio -> notification pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use hark::config::Settings;
//! use hark::summary::SummaryService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let service = SummaryService::from_settings(&settings)?;
//!
//!     // Summarize everything that's pending across enabled channels
//!     let report = service.process_channel_summaries(None, None, false, true).await;
//!     println!("Processed {} videos", report.processed);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod notify;
pub mod openai;
pub mod provider;
pub mod store;
pub mod summary;
pub mod transcript;
pub mod tts;
pub mod youtube;

pub use error::{HarkError, Result};
