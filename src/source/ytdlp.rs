//! Channel listing through `yt-dlp --dump-json --flat-playlist`.
//!
//! yt-dlp prints one JSON object per playlist entry. Flat listings are fast
//! because no video page is visited, but they often lack `upload_date`; in
//! that case the entry's epoch `timestamp` is used when present and the
//! normalizer's fallback date otherwise.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use super::ChannelBatch;
use crate::channels::ChannelConfig;
use crate::error::FetchError;
use crate::record::RawRecord;

#[derive(Debug, Clone)]
pub struct YtDlpSource {
    program: PathBuf,
    timeout: Duration,
    fetch_limit: Option<usize>,
    user_agent: Option<String>,
}

/// The handful of fields read from each `--dump-json` line.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    upload_date: Option<String>,
    timestamp: Option<f64>,
    release_timestamp: Option<f64>,
}

impl YtDlpSource {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            fetch_limit: None,
            user_agent: None,
        }
    }

    pub fn with_fetch_limit(mut self, fetch_limit: Option<usize>) -> Self {
        self.fetch_limit = fetch_limit;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub async fn fetch(&self, channel: &ChannelConfig) -> Result<ChannelBatch, FetchError> {
        let list_url = channel_list_url(&channel.source_ref);
        let program = self.program.display().to_string();
        debug!(%program, %list_url, "listing channel");

        let mut command = Command::new(&self.program);
        command
            .arg("--dump-json")
            .arg("--flat-playlist")
            .arg("--ignore-errors")
            .arg("--no-warnings");
        if let Some(limit) = self.fetch_limit {
            command.arg("--playlist-end").arg(limit.to_string());
        }
        if let Some(user_agent) = &self.user_agent {
            command.arg("--user-agent").arg(user_agent);
        }
        command.arg(&list_url).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(FetchError::Spawn { program, source }),
            Err(_) => {
                return Err(FetchError::Timeout {
                    program,
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let batch = parse_dump_lines(&stdout, &channel.display_name);

        if !output.status.success() {
            if batch.records.is_empty() && batch.skipped == 0 {
                return Err(FetchError::Status {
                    program,
                    status: output.status.to_string(),
                    stderr: last_line(&output.stderr),
                });
            }
            // --ignore-errors still exits non-zero when a single entry fails.
            warn!(
                channel = %channel.display_name,
                status = %output.status,
                "yt-dlp reported errors, keeping the {} entries it listed",
                batch.records.len()
            );
        }

        Ok(batch)
    }
}

/// Parses `--dump-json` output. Blank lines are ignored; lines that are not
/// JSON objects are counted as skipped.
fn parse_dump_lines(stdout: &str, channel_name: &str) -> ChannelBatch {
    let mut batch = ChannelBatch::default();
    for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match serde_json::from_str::<FlatEntry>(line) {
            Ok(entry) => batch.records.push(entry.into_raw(channel_name)),
            Err(err) => {
                debug!("skipping unreadable yt-dlp line: {err}");
                batch.skipped += 1;
            }
        }
    }
    batch
}

impl FlatEntry {
    fn into_raw(self, channel_name: &str) -> RawRecord {
        let upload_date = self
            .upload_date
            .filter(|value| !value.trim().is_empty() && value.trim() != "null");
        let raw_date = upload_date.or_else(|| {
            self.timestamp
                .or(self.release_timestamp)
                .and_then(timestamp_to_upload_date)
        });
        RawRecord {
            identifier: self.id,
            title: self.title,
            raw_date,
            source_channel: channel_name.to_string(),
        }
    }
}

/// Epoch seconds to yt-dlp's `YYYYMMDD` (UTC).
fn timestamp_to_upload_date(timestamp: f64) -> Option<String> {
    if !timestamp.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .map(|datetime| datetime.format("%Y%m%d").to_string())
}

fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Playlist URL for a channel reference: bare ids map to
/// `/channel/<id>/videos`, handles to `/@handle/videos`, and channel URLs get
/// `/videos` appended once. Playlist URLs are used as given.
pub fn channel_list_url(source_ref: &str) -> String {
    let source_ref = source_ref.trim();
    if source_ref.starts_with("https://") || source_ref.starts_with("http://") {
        return append_videos_tab(source_ref);
    }
    if let Some(handle) = source_ref.strip_prefix('@') {
        return format!("https://www.youtube.com/@{handle}/videos");
    }
    format!("https://www.youtube.com/channel/{source_ref}/videos")
}

fn append_videos_tab(channel_url: &str) -> String {
    let (without_fragment, fragment) = match channel_url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (channel_url, None),
    };
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };

    let base = base.trim_end_matches('/');
    let mut result = if base.ends_with("/videos") || base.ends_with("/playlist") {
        base.to_string()
    } else {
        format!("{base}/videos")
    };

    if let Some(query) = query {
        result.push('?');
        result.push_str(query);
    }
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }
    result
}

/// Runs `<program> --version` so a missing yt-dlp shows up once at startup
/// instead of as one failure per channel.
pub fn ensure_program_available(program: &Path) -> Result<()> {
    let status = std::process::Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!(
            "{} is installed but returned a failure status",
            program.display()
        ),
        Err(err) => bail!("{} is not installed or not in PATH: {}", program.display(), err),
    }
}
