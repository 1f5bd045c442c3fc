#![forbid(unsafe_code)]

//! Refreshes `videos.json` from every channel in the channel table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vidshelf_tools::{
    channels::{ChannelTable, SourceKind},
    config::{RuntimeOverrides, resolve_runtime_settings},
    pipeline::run_update,
    source::{Sources, ytdlp::ensure_program_available},
};

#[derive(Debug, Parser)]
#[command(
    name = "update_videos",
    about = "Fetch every configured channel and merge new uploads into the video list"
)]
struct Args {
    /// Video list to update (default: data/videos.json)
    #[arg(long, value_name = "PATH")]
    data_file: Option<PathBuf>,

    /// Channel table (default: channels.toml)
    #[arg(long, value_name = "PATH")]
    channels_file: Option<PathBuf>,

    /// Settings file read under the process environment (default: .env)
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Seconds to wait between two channels
    #[arg(long, value_name = "SECS")]
    cooldown_secs: Option<u64>,

    /// Only list the newest N uploads of each channel
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    fetch_limit: Option<u64>,
}

impl Args {
    fn into_overrides(self) -> RuntimeOverrides {
        RuntimeOverrides {
            data_file: self.data_file,
            channels_file: self.channels_file,
            cooldown_secs: self.cooldown_secs,
            fetch_limit: self.fetch_limit.map(|limit| limit as usize),
            env_path: self.env_file,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = resolve_runtime_settings(Args::parse().into_overrides())
        .context("resolving runtime settings")?;
    let channels = ChannelTable::load(&settings.channels_file)?;

    if channels.is_empty() {
        warn!(
            path = %settings.channels_file.display(),
            "channel table lists no channels, the store will only be renumbered"
        );
    }
    if channels.uses(SourceKind::YtDlp)
        && let Err(err) = ensure_program_available(&settings.yt_dlp)
    {
        warn!("{err:#}; yt-dlp channels will be skipped");
    }

    info!(
        channels = channels.channels().len(),
        data_file = %settings.data_file.display(),
        "starting update"
    );

    let sources = Sources::from_settings(&settings);
    let summary = run_update(&settings, &channels, &sources)
        .await
        .with_context(|| format!("saving {}", settings.data_file.display()))?;

    if summary.channels_failed > 0 {
        warn!(
            "{} of {} channels could not be fetched",
            summary.channels_failed,
            summary.channels_failed + summary.channels_ok
        );
    }
    Ok(())
}
