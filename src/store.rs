//! The persisted video list (`videos.json`).
//!
//! Loading never fails: a missing or damaged file simply means the next run
//! rebuilds the list from upstream. Saving is the one step allowed to abort a
//! run, since nothing useful happened if the result cannot be written.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::reconcile::presentation_order;
use crate::normalize::canonical_published;
use crate::record::{PersistedRecord, UNTITLED, canonical_url};

/// Every known video keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    records: BTreeMap<String, PersistedRecord>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PersistedRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Records in id order. Use [`presentation_order`] for display order.
    pub fn iter(&self) -> impl Iterator<Item = &PersistedRecord> {
        self.records.values()
    }

    pub(crate) fn records_mut(&mut self) -> &mut BTreeMap<String, PersistedRecord> {
        &mut self.records
    }
}

/// Builds a store from rows; the first row for an id wins.
impl FromIterator<PersistedRecord> for Store {
    fn from_iter<I: IntoIterator<Item = PersistedRecord>>(iter: I) -> Self {
        let mut records = BTreeMap::new();
        for record in iter {
            if records.contains_key(&record.id) {
                warn!(id = %record.id, "duplicate id in stored video list, keeping the first");
                continue;
            }
            records.insert(record.id.clone(), record);
        }
        Self { records }
    }
}

/// Reads the stored list. Missing, unreadable or non-array files give an empty
/// store. A row is dropped only when it has no string `id`; other damaged
/// fields are reset to defaults and `published` is rewritten as `YYYY-MM-DD`.
pub fn load(path: &Path) -> Store {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no stored video list yet");
            return Store::new();
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "could not read stored video list, starting fresh: {err}"
            );
            return Store::new();
        }
    };

    let rows = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(rows)) => rows,
        Ok(_) => {
            warn!(
                path = %path.display(),
                "stored video list is not a JSON array, starting fresh"
            );
            return Store::new();
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "stored video list is corrupt, starting fresh: {err}"
            );
            return Store::new();
        }
    };

    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value::<PersistedRecord>(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(index, "dropping unreadable stored entry: {err}");
                None
            }
        })
        .filter_map(|mut record| {
            record.id = record.id.trim().to_string();
            if record.id.is_empty() {
                warn!("dropping stored entry with a blank id");
                return None;
            }
            if record.title.trim().is_empty() {
                record.title = UNTITLED.to_string();
            }
            if record.url.trim().is_empty() {
                record.url = canonical_url(&record.id);
            }
            let published = canonical_published(&record.published);
            if published != record.published {
                debug!(
                    id = %record.id,
                    from = %record.published,
                    to = %published,
                    "rewriting stored date"
                );
                record.published = published;
            }
            Some(record)
        })
        .collect()
}

/// Writes the whole store newest first. The document goes to a temporary file
/// next to `path` and is renamed over it, so an interrupted run leaves the
/// previous list intact.
pub fn save(path: &Path, store: &Store) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let payload = to_pretty_json(&presentation_order(store))?;

    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&payload).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

/// Four-space indentation, matching the files the gallery pages were built
/// against.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}
