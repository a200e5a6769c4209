//! CLI module for Hark.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};

/// Hark - YouTube Channel Audio Summaries
///
/// Tracks YouTube channels, fetches transcripts for their latest uploads,
/// summarizes them with an LLM, synthesizes the summary to audio, and
/// delivers it as a notification.
#[derive(Parser, Debug)]
#[command(name = "hark")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch latest videos and transcripts for configured channels
    Scrape {
        /// Only process this channel (by configured name)
        #[arg(long)]
        channel: Option<String>,

        /// Re-fetch transcripts even if already cached
        #[arg(short, long)]
        force: bool,
    },

    /// Summarize pending transcripts into audio and send notifications
    Summarize {
        /// Only process this channel (by configured name)
        #[arg(long)]
        channel: Option<String>,

        /// Process a single video by URL instead of a channel batch
        #[arg(long)]
        url: Option<String>,

        /// Maximum number of videos to process per channel
        #[arg(short, long)]
        limit: Option<usize>,

        /// Force re-scrape before summarizing
        #[arg(short, long)]
        force: bool,

        /// Skip the scraping pass and use only stored videos
        #[arg(long)]
        no_scrape: bool,
    },

    /// Retry videos whose summary processing failed
    Retry {
        /// Maximum number of videos to retry
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show database, summary, channel, and provider status
    Status,

    /// Test provider connectivity
    Test {
        /// Which capability to test
        #[arg(value_enum)]
        capability: Capability,

        /// Test a single instance by name instead of all
        #[arg(short, long)]
        instance: Option<String>,
    },

    /// Remove old summary audio files and empty cache directories
    Cleanup {
        /// Delete audio files older than this many hours
        #[arg(long, default_value = "24")]
        max_age_hours: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Capability {
    Llm,
    Tts,
    Notify,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
