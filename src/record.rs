//! Records flowing through an update run, from what an adapter hands over to
//! what ends up in `videos.json`.
//!
//! The persisted field names (`id`, `title`, `channel`, `published`, `url`,
//! `status`, `sequence`) are read directly by gallery pages, so they must not
//! be renamed.

use std::str::FromStr;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Date used when upstream gives no usable upload date. Sorts before every
/// real upload so undated entries never float to the top of the gallery.
pub const FALLBACK_PUBLISHED: &str = "1970-01-01";

/// Title used when upstream omits one.
pub const UNTITLED: &str = "Untitled video";

/// Watch page for a video id.
pub fn canonical_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// One entry exactly as an adapter produced it. Every field except the
/// channel may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub identifier: Option<String>,
    pub title: Option<String>,
    /// `YYYYMMDD`, the literal `"null"`, or anything else upstream sent.
    pub raw_date: Option<String>,
    /// Display name of the configured channel that yielded this entry.
    pub source_channel: String,
}

/// Cleaned-up entry ready to be merged into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub id: String,
    pub title: String,
    pub channel: String,
    /// `YYYY-MM-DD` or [`FALLBACK_PUBLISHED`].
    pub published: String,
    pub url: String,
}

/// User-controlled inclusion flag. Stored as `"Yes"` / `"No"`; on read any
/// casing of yes/no, included/excluded or a JSON boolean is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    #[default]
    #[serde(rename = "Yes")]
    Included,
    #[serde(rename = "No")]
    Excluded,
}

impl FromStr for Status {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "included" | "include" => Ok(Status::Included),
            "no" | "n" | "false" | "excluded" | "exclude" => Ok(Status::Excluded),
            _ => Err(format!("unknown status {value:?}")),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(value) => value.parse().map_err(D::Error::custom),
            Value::Bool(true) => Ok(Status::Included),
            Value::Bool(false) => Ok(Status::Excluded),
            other => Err(D::Error::custom(format!("unknown status {other}"))),
        }
    }
}

/// Row of `videos.json`.
///
/// Only `id` is required. Every other field that is missing or of the wrong
/// type falls back to its default, so one bad value in a hand-edited file
/// never costs the row (and with it the user's `status`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: String,
    #[serde(default = "default_title", deserialize_with = "lenient")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub channel: String,
    #[serde(default = "default_published", deserialize_with = "lenient")]
    pub published: String,
    #[serde(default, deserialize_with = "lenient")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Status,
    /// Recomputed on every run; stored values are only informative.
    #[serde(default, deserialize_with = "lenient")]
    pub sequence: u32,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        warn!("ignoring unreadable stored value: {err}");
        T::default()
    }))
}

fn default_title() -> String {
    UNTITLED.to_string()
}

fn default_published() -> String {
    FALLBACK_PUBLISHED.to_string()
}

impl PersistedRecord {
    /// First sighting of a video: included, not yet ranked.
    pub fn from_canonical(record: CanonicalRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            channel: record.channel,
            published: record.published,
            url: record.url,
            status: Status::Included,
            sequence: 0,
        }
    }

    /// Refreshes upstream-owned fields. `status` belongs to the user and is
    /// left alone.
    pub fn refresh_from(&mut self, record: CanonicalRecord) {
        self.title = record.title;
        self.channel = record.channel;
        self.published = record.published;
        self.url = record.url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(id: &str, published: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: id.into(),
            title: format!("Video {id}"),
            channel: "Channel".into(),
            published: published.into(),
            url: canonical_url(id),
        }
    }

    #[test]
    fn persisted_record_uses_gallery_field_names() {
        let mut record = PersistedRecord::from_canonical(canonical("abc", "2024-01-02"));
        record.sequence = 3;
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "abc",
                "title": "Video abc",
                "channel": "Channel",
                "published": "2024-01-02",
                "url": "https://www.youtube.com/watch?v=abc",
                "status": "Yes",
                "sequence": 3
            })
        );
    }

    #[test]
    fn status_accepts_legacy_spellings() {
        let parsed: Vec<Status> = serde_json::from_value(json!([
            "Yes", "No", "yes", "NO", " no ", "Included", "EXCLUDED", true, false
        ]))
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                Status::Included,
                Status::Excluded,
                Status::Included,
                Status::Excluded,
                Status::Excluded,
                Status::Included,
                Status::Excluded,
                Status::Included,
                Status::Excluded,
            ]
        );
        assert!(serde_json::from_value::<Status>(json!("maybe")).is_err());
        assert!(serde_json::from_value::<Status>(json!(1)).is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let record: PersistedRecord = serde_json::from_value(json!({"id": "bare"})).unwrap();
        assert_eq!(record.title, UNTITLED);
        assert_eq!(record.published, FALLBACK_PUBLISHED);
        assert_eq!(record.status, Status::Included);
        assert_eq!(record.sequence, 0);
    }

    #[test]
    fn wrongly_typed_fields_fall_back_instead_of_failing() {
        let record: PersistedRecord = serde_json::from_value(json!({
            "id": "v1",
            "title": 42,
            "channel": null,
            "status": "NO",
            "sequence": -1
        }))
        .unwrap();
        assert_eq!(record.status, Status::Excluded);
        assert_eq!(record.sequence, 0);
        assert_eq!(record.channel, "");
        assert_eq!(record.title, "");

        for sequence in [json!(null), json!("3"), json!(4.5), json!(u64::MAX)] {
            let record: PersistedRecord =
                serde_json::from_value(json!({"id": "v1", "sequence": sequence})).unwrap();
            assert_eq!(record.sequence, 0);
        }

        assert!(serde_json::from_value::<PersistedRecord>(json!({"id": 7})).is_err());
        assert!(serde_json::from_value::<PersistedRecord>(json!({"title": "no id"})).is_err());
    }

    #[test]
    fn refresh_keeps_status() {
        let mut record = PersistedRecord::from_canonical(canonical("abc", "2024-01-02"));
        record.status = Status::Excluded;
        let mut update = canonical("abc", "2024-02-01");
        update.title = "Renamed".into();
        record.refresh_from(update);
        assert_eq!(record.status, Status::Excluded);
        assert_eq!(record.title, "Renamed");
        assert_eq!(record.published, "2024-02-01");
    }
}
