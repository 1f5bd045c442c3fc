//! Turns adapter output into canonical records.

use chrono::{DateTime, NaiveDate};

use crate::record::{CanonicalRecord, FALLBACK_PUBLISHED, RawRecord, UNTITLED, canonical_url};

/// Normalizes one raw entry. Returns `None` only when the entry has no usable
/// identifier; every other gap is filled with a default.
pub fn normalize(raw: RawRecord) -> Option<CanonicalRecord> {
    let id = raw
        .identifier
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();

    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    let published = raw
        .raw_date
        .as_deref()
        .and_then(upload_date_to_published)
        .unwrap_or_else(|| FALLBACK_PUBLISHED.to_string());

    let url = canonical_url(&id);
    Some(CanonicalRecord {
        id,
        title,
        channel: raw.source_channel,
        published,
        url,
    })
}

/// Converts yt-dlp's `YYYYMMDD` into `YYYY-MM-DD`. Anything that is not eight
/// digits naming a real calendar day (including the `"null"` placeholder some
/// extractors print) yields `None`.
fn upload_date_to_published(value: &str) -> Option<String> {
    compact_date(value.trim()).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Calendar date of a `published` value written by any version of the
/// tooling: `YYYY-MM-DD`, `YYYYMMDD`, or an RFC 3339 timestamp (date taken
/// as written, offset ignored).
pub fn published_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Some(date) = compact_date(value).or_else(|| iso_date(value)) {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }
    match value.as_bytes().get(10) {
        Some(b'T' | b't' | b' ') => iso_date(value.get(..10)?),
        _ => None,
    }
}

/// Rewrites a stored `published` value as `YYYY-MM-DD`, or the fallback date
/// when no calendar day can be read from it.
pub fn canonical_published(value: &str) -> String {
    published_date(value)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| FALLBACK_PUBLISHED.to_string())
}

fn compact_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        value[0..4].parse().ok()?,
        value[4..6].parse().ok()?,
        value[6..8].parse().ok()?,
    )
}

/// Strict `YYYY-MM-DD`; `2023-6-1` is rejected since it would sort wrongly.
fn iso_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let digits_at = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if bytes.len() != 10
        || bytes[4] != b'-'
        || bytes[7] != b'-'
        || !digits_at(0..4)
        || !digits_at(5..7)
        || !digits_at(8..10)
    {
        return None;
    }
    NaiveDate::from_ymd_opt(
        value[0..4].parse().ok()?,
        value[5..7].parse().ok()?,
        value[8..10].parse().ok()?,
    )
}
