//! Where raw video lists come from.
//!
//! Each adapter turns one configured channel into a [`ChannelBatch`]. An
//! empty batch means the channel currently has nothing to offer; an `Err`
//! means the fetch itself went wrong. Both are per-channel outcomes and never
//! stop the run.

pub mod feed;
pub mod ytdlp;

use crate::channels::{ChannelConfig, SourceKind};
use crate::config::RuntimeSettings;
use crate::error::FetchError;
use crate::record::RawRecord;

pub use feed::FeedSource;
pub use ytdlp::YtDlpSource;

/// Entries produced for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelBatch {
    pub records: Vec<RawRecord>,
    /// Lines or entries that could not be read at all.
    pub skipped: usize,
}

/// Something that can list a channel's videos.
#[allow(async_fn_in_trait)]
pub trait ChannelSource {
    async fn fetch(&self, channel: &ChannelConfig) -> Result<ChannelBatch, FetchError>;
}

/// Dispatches each channel to the adapter named in the channel table.
#[derive(Debug, Clone)]
pub struct Sources {
    pub yt_dlp: YtDlpSource,
    pub feed: FeedSource,
}

impl Sources {
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        let yt_dlp = YtDlpSource::new(&settings.yt_dlp, settings.fetch_timeout)
            .with_fetch_limit(settings.fetch_limit)
            .with_user_agent(settings.user_agent.clone());
        let feed = FeedSource::new(settings.fetch_timeout, settings.user_agent.as_deref())
            .with_fetch_limit(settings.fetch_limit);
        Self { yt_dlp, feed }
    }
}

impl ChannelSource for YtDlpSource {
    async fn fetch(&self, channel: &ChannelConfig) -> Result<ChannelBatch, FetchError> {
        YtDlpSource::fetch(self, channel).await
    }
}

impl ChannelSource for FeedSource {
    async fn fetch(&self, channel: &ChannelConfig) -> Result<ChannelBatch, FetchError> {
        FeedSource::fetch(self, channel).await
    }
}

impl ChannelSource for Sources {
    async fn fetch(&self, channel: &ChannelConfig) -> Result<ChannelBatch, FetchError> {
        match channel.source {
            SourceKind::YtDlp => self.yt_dlp.fetch(channel).await,
            SourceKind::Feed => self.feed.fetch(channel).await,
        }
    }
}
