//! The channel table: which channels to fetch, how, and under which name.
//!
//! ```toml
//! [[channel]]
//! source_ref = "UCuzHfz9jikRLrow8lcyjEQQ"
//! display_name = "FancyToast"
//! source = "feed"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::warn;

/// How a channel's video list is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// `yt-dlp --dump-json --flat-playlist` on the channel's videos tab.
    #[default]
    #[serde(alias = "ytdlp")]
    YtDlp,
    /// The channel's public Atom feed (latest ~15 uploads).
    #[serde(alias = "rss")]
    Feed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Channel id (`UC...`) or any channel URL.
    pub source_ref: String,
    /// Name written to the `channel` field of every video.
    pub display_name: String,
    #[serde(default)]
    pub source: SourceKind,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelFile {
    #[serde(default, rename = "channel")]
    channels: Vec<ChannelConfig>,
}

/// Validated, read-only list of channels for one run.
#[derive(Debug, Clone, Default)]
pub struct ChannelTable {
    channels: Vec<ChannelConfig>,
}

impl ChannelTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading channel table {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing channel table {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: ChannelFile = toml::from_str(raw)?;
        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(file.channels.len());

        for (index, mut channel) in file.channels.into_iter().enumerate() {
            channel.source_ref = channel.source_ref.trim().to_string();
            channel.display_name = channel.display_name.trim().to_string();
            if channel.source_ref.is_empty() {
                bail!("channel #{} has an empty source_ref", index + 1);
            }
            if channel.display_name.is_empty() {
                bail!("channel {} has an empty display_name", channel.source_ref);
            }
            if !seen.insert(channel.source_ref.clone()) {
                warn!(
                    source_ref = %channel.source_ref,
                    "channel listed twice, keeping the first entry"
                );
                continue;
            }
            channels.push(channel);
        }

        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn uses(&self, kind: SourceKind) -> bool {
        self.channels.iter().any(|channel| channel.source == kind)
    }
}

impl From<Vec<ChannelConfig>> for ChannelTable {
    fn from(channels: Vec<ChannelConfig>) -> Self {
        Self { channels }
    }
}
