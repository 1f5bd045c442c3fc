//! Merges freshly fetched videos into the stored list and renumbers it.
//!
//! Rules:
//! - ids are unique across all channels; a later sighting in the same batch
//!   overwrites an earlier one
//! - a known id gets its title, channel, date and url refreshed, never its
//!   status
//! - ids missing from the batch stay as they are (fetch windows are bounded,
//!   absence upstream says nothing)
//! - `sequence` is the 1-based rank by `(published, id)`, oldest first
//! - display order is `(published, sequence)`, newest first

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::record::{CanonicalRecord, PersistedRecord};
use crate::store::Store;

/// What a reconciliation did, for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ids seen for the first time.
    pub added: usize,
    /// Stored ids that were seen again.
    pub updated: usize,
    /// Stored ids the batch did not mention.
    pub retained: usize,
}

pub fn reconcile(previous: Store, fresh: impl IntoIterator<Item = CanonicalRecord>) -> Store {
    reconcile_with_report(previous, fresh).0
}

pub fn reconcile_with_report(
    mut store: Store,
    fresh: impl IntoIterator<Item = CanonicalRecord>,
) -> (Store, ReconcileReport) {
    let previous_len = store.len();
    let mut added: HashSet<String> = HashSet::new();
    let mut updated: HashSet<String> = HashSet::new();

    let records = store.records_mut();
    for record in fresh {
        match records.get_mut(&record.id) {
            Some(existing) => {
                if !added.contains(&record.id) {
                    updated.insert(record.id.clone());
                }
                existing.refresh_from(record);
            }
            None => {
                added.insert(record.id.clone());
                records.insert(record.id.clone(), PersistedRecord::from_canonical(record));
            }
        }
    }

    resequence(&mut store);

    let report = ReconcileReport {
        added: added.len(),
        updated: updated.len(),
        retained: previous_len - updated.len(),
    };
    (store, report)
}

/// Assigns `sequence` 1..=N by `(published, id)` ascending.
pub fn resequence(store: &mut Store) {
    let mut ranked: Vec<&mut PersistedRecord> = store.records_mut().values_mut().collect();
    ranked.sort_by(|a, b| sequence_key(a).cmp(&sequence_key(b)));
    for (rank, record) in ranked.into_iter().enumerate() {
        record.sequence = rank as u32 + 1;
    }
}

fn sequence_key(record: &PersistedRecord) -> (&str, &str) {
    (record.published.as_str(), record.id.as_str())
}

/// The store as it should be shown and saved: newest first.
pub fn presentation_order(store: &Store) -> Vec<&PersistedRecord> {
    let mut ordered: Vec<&PersistedRecord> = store.iter().collect();
    ordered.sort_by(|a, b| newest_first(a, b));
    ordered
}

fn newest_first(a: &PersistedRecord, b: &PersistedRecord) -> Ordering {
    b.published
        .cmp(&a.published)
        .then_with(|| b.sequence.cmp(&a.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FALLBACK_PUBLISHED, Status, canonical_url};
    use proptest::prelude::*;

    fn canonical(id: &str, published: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: id.into(),
            title: format!("Video {id}"),
            channel: "Channel".into(),
            published: published.into(),
            url: canonical_url(id),
        }
    }

    fn ids(records: &[&PersistedRecord]) -> Vec<String> {
        records.iter().map(|record| record.id.clone()).collect()
    }

    #[test]
    fn new_store_ranks_oldest_first_and_shows_newest_first() {
        let store = reconcile(
            Store::new(),
            vec![canonical("v1", "2024-01-01"), canonical("v2", "2024-01-03")],
        );
        assert_eq!(store.get("v1").unwrap().sequence, 1);
        assert_eq!(store.get("v2").unwrap().sequence, 2);
        assert_eq!(store.get("v1").unwrap().status, Status::Included);
        assert_eq!(ids(&presentation_order(&store)), vec!["v2", "v1"]);
    }

    #[test]
    fn excluded_status_survives_refetch_with_new_date() {
        let mut store = reconcile(Store::new(), vec![canonical("v1", "2024-01-01")]);
        store.records_mut().get_mut("v1").unwrap().status = Status::Excluded;

        let mut refreshed = canonical("v1", "2024-01-05");
        refreshed.title = "Updated title".into();
        let (store, report) = reconcile_with_report(store, vec![refreshed]);

        let v1 = store.get("v1").unwrap();
        assert_eq!(v1.status, Status::Excluded);
        assert_eq!(v1.published, "2024-01-05");
        assert_eq!(v1.title, "Updated title");
        assert_eq!(
            report,
            ReconcileReport {
                added: 0,
                updated: 1,
                retained: 0
            }
        );
    }

    #[test]
    fn records_missing_from_batch_are_kept() {
        let store = reconcile(
            Store::new(),
            vec![canonical("old", "2020-05-01"), canonical("mid", "2022-05-01")],
        );
        let (store, report) = reconcile_with_report(store, vec![canonical("new", "2024-05-01")]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("old").unwrap().sequence, 1);
        assert_eq!(store.get("mid").unwrap().sequence, 2);
        assert_eq!(store.get("new").unwrap().sequence, 3);
        assert_eq!(
            report,
            ReconcileReport {
                added: 1,
                updated: 0,
                retained: 2
            }
        );
    }

    #[test]
    fn duplicate_ids_in_one_batch_collapse_to_last_sighting() {
        let mut second = canonical("dup", "2024-03-01");
        second.channel = "Other channel".into();
        let (store, report) =
            reconcile_with_report(Store::new(), vec![canonical("dup", "2024-01-01"), second]);
        assert_eq!(store.len(), 1);
        let dup = store.get("dup").unwrap();
        assert_eq!(dup.channel, "Other channel");
        assert_eq!(dup.published, "2024-03-01");
        assert_eq!(dup.sequence, 1);
        assert_eq!(
            report,
            ReconcileReport {
                added: 1,
                updated: 0,
                retained: 0
            }
        );
    }

    #[test]
    fn same_date_ties_break_on_id() {
        let store = reconcile(
            Store::new(),
            vec![
                canonical("b", "2024-01-01"),
                canonical("a", "2024-01-01"),
                canonical("c", "2024-01-01"),
            ],
        );
        assert_eq!(store.get("a").unwrap().sequence, 1);
        assert_eq!(store.get("b").unwrap().sequence, 2);
        assert_eq!(store.get("c").unwrap().sequence, 3);
        assert_eq!(ids(&presentation_order(&store)), vec!["c", "b", "a"]);
    }

    #[test]
    fn undated_videos_rank_as_oldest() {
        let store = reconcile(
            Store::new(),
            vec![canonical("dated", "2001-01-01"), canonical("undated", FALLBACK_PUBLISHED)],
        );
        assert_eq!(store.get("undated").unwrap().sequence, 1);
        assert_eq!(ids(&presentation_order(&store)), vec!["dated", "undated"]);
    }

    #[test]
    fn stale_sequences_from_disk_are_renumbered() {
        let mut store: Store = [("x", "2024-01-01", 7), ("y", "2023-01-01", 7)]
            .into_iter()
            .map(|(id, published, sequence)| {
                let mut record = PersistedRecord::from_canonical(canonical(id, published));
                record.sequence = sequence;
                record
            })
            .collect();
        resequence(&mut store);
        assert_eq!(store.get("y").unwrap().sequence, 1);
        assert_eq!(store.get("x").unwrap().sequence, 2);
    }

    #[test]
    fn empty_batch_on_empty_store_is_empty() {
        let (store, report) = reconcile_with_report(Store::new(), Vec::new());
        assert!(store.is_empty());
        assert_eq!(report, ReconcileReport::default());
    }

    fn canonical_strategy() -> impl Strategy<Value = CanonicalRecord> {
        (
            0u8..12,
            prop::sample::select(vec![
                FALLBACK_PUBLISHED,
                "2023-05-01",
                "2024-01-01",
                "2024-01-03",
            ]),
            "[a-z]{0,6}",
        )
            .prop_map(|(n, published, title)| {
                let id = format!("v{n}");
                CanonicalRecord {
                    url: canonical_url(&id),
                    id,
                    title,
                    channel: "Channel".into(),
                    published: published.to_string(),
                }
            })
    }

    fn store_strategy() -> impl Strategy<Value = Store> {
        (
            prop::collection::vec(canonical_strategy(), 0..10),
            prop::collection::vec(any::<bool>(), 12),
        )
            .prop_map(|(batch, excluded)| {
                let mut store = reconcile(Store::new(), batch);
                for (record, flag) in store.records_mut().values_mut().zip(excluded) {
                    if flag {
                        record.status = Status::Excluded;
                    }
                }
                store
            })
    }

    proptest! {
        #[test]
        fn reconcile_is_idempotent(
            store in store_strategy(),
            batch in prop::collection::vec(canonical_strategy(), 0..10)
        ) {
            let once = reconcile(store, batch);
            let twice = reconcile(once.clone(), Vec::new());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn excluded_status_is_sticky(
            store in store_strategy(),
            batch in prop::collection::vec(canonical_strategy(), 0..10)
        ) {
            let excluded: Vec<String> = store
                .iter()
                .filter(|record| record.status == Status::Excluded)
                .map(|record| record.id.clone())
                .collect();
            let merged = reconcile(store, batch);
            for id in excluded {
                let status = merged.get(&id).map(|record| record.status);
                prop_assert_eq!(status, Some(Status::Excluded));
            }
        }

        #[test]
        fn no_stored_id_is_lost(
            store in store_strategy(),
            batch in prop::collection::vec(canonical_strategy(), 0..10)
        ) {
            let before: Vec<String> = store.iter().map(|record| record.id.clone()).collect();
            let merged = reconcile(store, batch);
            for id in before {
                prop_assert!(merged.contains(&id));
            }
        }

        #[test]
        fn sequences_are_contiguous(
            store in store_strategy(),
            batch in prop::collection::vec(canonical_strategy(), 0..10)
        ) {
            let merged = reconcile(store, batch);
            let mut sequences: Vec<u32> = merged.iter().map(|record| record.sequence).collect();
            sequences.sort_unstable();
            let expected: Vec<u32> = (1..=merged.len() as u32).collect();
            prop_assert_eq!(sequences, expected);
        }

        #[test]
        fn later_dates_are_shown_first(
            store in store_strategy(),
            batch in prop::collection::vec(canonical_strategy(), 0..10)
        ) {
            let merged = reconcile(store, batch);
            let shown = presentation_order(&merged);
            for pair in shown.windows(2) {
                prop_assert!(pair[0].published >= pair[1].published);
                if pair[0].published == pair[1].published {
                    prop_assert!(pair[0].sequence > pair[1].sequence);
                }
            }
        }
    }
}
