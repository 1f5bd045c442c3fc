//! Channel listing through YouTube's public Atom feed.
//!
//! The feed only carries the latest ~15 uploads, but needs no external tool
//! and always includes a full publication timestamp.

use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use super::ChannelBatch;
use crate::channels::ChannelConfig;
use crate::error::FetchError;
use crate::normalize::published_date;
use crate::record::RawRecord;

#[derive(Debug, Clone)]
pub struct FeedSource {
    agent: ureq::Agent,
    fetch_limit: Option<usize>,
}

impl FeedSource {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Self {
        let mut builder = ureq::AgentBuilder::new().timeout(timeout);
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }
        Self {
            agent: builder.build(),
            fetch_limit: None,
        }
    }

    pub fn with_fetch_limit(mut self, fetch_limit: Option<usize>) -> Self {
        self.fetch_limit = fetch_limit;
        self
    }

    pub async fn fetch(&self, channel: &ChannelConfig) -> Result<ChannelBatch, FetchError> {
        let url = feed_url(&channel.source_ref);
        debug!(%url, "downloading feed");

        let agent = self.agent.clone();
        let request_url = url.clone();
        let body = tokio::task::spawn_blocking(move || download(&agent, &request_url))
            .await
            .map_err(|err| FetchError::Http {
                url: url.clone(),
                message: format!("download task failed: {err}"),
            })??;

        let mut batch = parse_feed(&body, &url, &channel.display_name)?;
        if let Some(limit) = self.fetch_limit {
            batch.records.truncate(limit);
        }
        Ok(batch)
    }
}

fn download(agent: &ureq::Agent, url: &str) -> Result<String, FetchError> {
    let http_err = |message: String| FetchError::Http {
        url: url.to_string(),
        message,
    };
    let response = agent.get(url).call().map_err(|err| match err {
        ureq::Error::Status(code, _) => http_err(format!("server answered {code}")),
        ureq::Error::Transport(transport) => http_err(transport.to_string()),
    })?;
    response
        .into_string()
        .map_err(|err| http_err(format!("reading body: {err}")))
}

/// Feed address for a channel reference. Bare ids use the standard
/// `channel_id` query; full URLs are taken as they are.
pub fn feed_url(source_ref: &str) -> String {
    let source_ref = source_ref.trim();
    if source_ref.starts_with("https://") || source_ref.starts_with("http://") {
        source_ref.to_string()
    } else {
        format!("https://www.youtube.com/feeds/videos.xml?channel_id={source_ref}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    VideoId,
    AtomId,
    Title,
    Published,
}

#[derive(Debug, Default)]
struct PendingEntry {
    video_id: Option<String>,
    atom_id: Option<String>,
    title: Option<String>,
    published: Option<String>,
}

impl PendingEntry {
    fn set(&mut self, field: Field, text: String) {
        let slot = match field {
            Field::VideoId => &mut self.video_id,
            Field::AtomId => &mut self.atom_id,
            Field::Title => &mut self.title,
            Field::Published => &mut self.published,
        };
        slot.get_or_insert_with(String::new).push_str(&text);
    }

    /// `None` when the entry names no video at all.
    fn finish(self, channel_name: &str) -> Option<RawRecord> {
        let identifier = self
            .video_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| {
                self.atom_id
                    .as_deref()
                    .and_then(|id| id.trim().strip_prefix("yt:video:"))
                    .map(str::to_string)
            })?;
        Some(RawRecord {
            identifier: Some(identifier),
            title: self.title,
            raw_date: self.published.as_deref().and_then(published_to_upload_date),
            source_channel: channel_name.to_string(),
        })
    }
}

/// `2024-01-02T10:00:00+00:00` to `20240102`, keeping the calendar date as
/// written in the feed.
fn published_to_upload_date(published: &str) -> Option<String> {
    published_date(published).map(|date| date.format("%Y%m%d").to_string())
}

/// Reads `<entry>` elements out of an Atom document. A document that breaks
/// off midway still yields the entries completed before the break.
fn parse_feed(body: &str, url: &str, channel_name: &str) -> Result<ChannelBatch, FetchError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut batch = ChannelBatch::default();
    let mut saw_feed = false;
    let mut entry: Option<PendingEntry> = None;
    let mut field: Option<Field> = None;
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                depth += 1;
                // Matched on local names so any namespace prefix works;
                // depth keeps `media:group/media:title` out of the entry title.
                match e.local_name().as_ref() {
                    b"feed" if depth == 1 => saw_feed = true,
                    b"entry" if saw_feed && depth == 2 => entry = Some(PendingEntry::default()),
                    name if entry.is_some() && depth == 3 => {
                        field = match name {
                            b"videoId" => Some(Field::VideoId),
                            b"id" => Some(Field::AtomId),
                            b"title" => Some(Field::Title),
                            b"published" => Some(Field::Published),
                            _ => None,
                        };
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some(field)) = (entry.as_mut(), field) {
                    let text = t.unescape().map(|t| t.to_string()).unwrap_or_default();
                    entry.set(field, text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(entry), Some(field)) = (entry.as_mut(), field) {
                    entry.set(field, String::from_utf8_lossy(&c).into_owned());
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if depth == 2
                    && e.local_name().as_ref() == b"entry"
                    && let Some(finished) = entry.take()
                {
                    match finished.finish(channel_name) {
                        Some(record) => batch.records.push(record),
                        None => batch.skipped += 1,
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(_) => {}
            Err(err) => {
                if !saw_feed || (batch.records.is_empty() && batch.skipped == 0) {
                    return Err(FetchError::Feed {
                        url: url.to_string(),
                        message: format!(
                            "malformed XML at byte {}: {err}",
                            reader.buffer_position()
                        ),
                    });
                }
                warn!(
                    %url,
                    "feed broke off at byte {}, keeping {} entries: {err}",
                    reader.buffer_position(),
                    batch.records.len()
                );
                break;
            }
        }
        buf.clear();
    }

    if !saw_feed {
        return Err(FetchError::Feed {
            url: url.to_string(),
            message: "document has no <feed> element".to_string(),
        });
    }
    Ok(batch)
}
