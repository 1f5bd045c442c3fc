//! One update run: load, fetch every channel, reconcile, save.

use std::time::Duration;

use tracing::{info, warn};

use crate::channels::ChannelTable;
use crate::config::RuntimeSettings;
use crate::error::StoreError;
use crate::normalize::normalize;
use crate::reconcile::{ReconcileReport, reconcile_with_report};
use crate::source::ChannelSource;
use crate::store;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub channels_ok: usize,
    pub channels_failed: usize,
    /// Entries that normalized into a record.
    pub fetched: usize,
    /// Unreadable lines plus entries without an id.
    pub skipped: usize,
    pub report: ReconcileReport,
    /// Records written to the store.
    pub total: usize,
}

/// Fetches every channel in order and merges the results into the store at
/// `settings.data_file`. Channel failures are logged and skipped; only a
/// failed save ends the run with an error.
pub async fn run_update<S: ChannelSource>(
    settings: &RuntimeSettings,
    channels: &ChannelTable,
    source: &S,
) -> Result<RunSummary, StoreError> {
    let previous = store::load(&settings.data_file);
    info!(
        path = %settings.data_file.display(),
        records = previous.len(),
        "loaded store"
    );

    let mut summary = RunSummary::default();
    let mut fresh = Vec::new();

    for (index, channel) in channels.channels().iter().enumerate() {
        if index > 0 {
            cooldown(settings.cooldown).await;
        }

        let batch = match source.fetch(channel).await {
            Ok(batch) => batch,
            Err(err) => {
                warn!(channel = %channel.display_name, "skipping channel: {err}");
                summary.channels_failed += 1;
                continue;
            }
        };

        let listed = batch.records.len();
        let mut skipped = batch.skipped;
        let before = fresh.len();
        for raw in batch.records {
            match normalize(raw) {
                Some(record) => fresh.push(record),
                None => skipped += 1,
            }
        }
        let fetched = fresh.len() - before;

        info!(
            channel = %channel.display_name,
            listed,
            fetched,
            skipped,
            "channel done"
        );
        summary.channels_ok += 1;
        summary.fetched += fetched;
        summary.skipped += skipped;
    }

    let (merged, report) = reconcile_with_report(previous, fresh);
    store::save(&settings.data_file, &merged)?;

    summary.report = report;
    summary.total = merged.len();
    info!(
        added = report.added,
        updated = report.updated,
        retained = report.retained,
        total = summary.total,
        channels_ok = summary.channels_ok,
        channels_failed = summary.channels_failed,
        "store saved to {}",
        settings.data_file.display()
    );
    Ok(summary)
}

async fn cooldown(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
