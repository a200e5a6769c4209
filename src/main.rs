//! Hark CLI entry point.

use anyhow::Result;
use clap::Parser;
use hark::cli::{commands, Cli, Commands};
use hark::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("hark={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Scrape { channel, force } => {
            commands::run_scrape(channel.as_deref(), *force, settings).await?;
        }

        Commands::Summarize {
            channel,
            url,
            limit,
            force,
            no_scrape,
        } => {
            commands::run_summarize(
                channel.as_deref(),
                url.as_deref(),
                *limit,
                *force,
                *no_scrape,
                settings,
            )
            .await?;
        }

        Commands::Retry { limit } => {
            commands::run_retry(*limit, settings).await?;
        }

        Commands::Status => {
            commands::run_status(settings).await?;
        }

        Commands::Test {
            capability,
            instance,
        } => {
            commands::run_test(*capability, instance.as_deref(), settings).await?;
        }

        Commands::Cleanup { max_age_hours } => {
            commands::run_cleanup(*max_age_hours, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
