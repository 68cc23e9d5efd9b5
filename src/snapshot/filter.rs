//! Date-range, exclusion and latest-only filtering of parsed snapshots.
//!
//! Filtering is a pure transformation: no I/O, and identical input plus
//! identical parameters always give identical output.

use std::collections::{HashMap, HashSet};

use tracing::info;

use super::record::SnapshotRecord;
use crate::config::TimestampBound;

/// Counts of what each filtering stage removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Records handed to the filter.
    pub input: usize,
    /// Records outside `[from, to]`.
    pub out_of_range: usize,
    /// Records whose timestamp was explicitly excluded.
    pub excluded: usize,
    /// Older captures removed by latest-only reduction.
    pub superseded: usize,
}

impl FilterStats {
    /// Records removed by range bounds or latest-only reduction.
    #[must_use]
    pub fn filtered(&self) -> usize {
        self.out_of_range + self.superseded
    }
}

/// Why a record was left out of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Outside `[from, to]`.
    OutOfRange,
    /// Timestamp explicitly excluded.
    Excluded,
    /// A newer capture of the same URL was kept.
    Superseded,
}

/// Ordered snapshots that survived filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredSnapshotSet {
    records: Vec<SnapshotRecord>,
    skipped: Vec<(SkipReason, SnapshotRecord)>,
    stats: FilterStats,
}

impl FilteredSnapshotSet {
    /// Surviving records in order.
    #[must_use]
    pub fn records(&self) -> &[SnapshotRecord] {
        &self.records
    }

    /// Consumes the set, returning the records.
    #[must_use]
    pub fn into_records(self) -> Vec<SnapshotRecord> {
        self.records
    }

    /// Records each stage removed, range and exclusion drops in input
    /// order followed by superseded captures.
    #[must_use]
    pub fn skipped(&self) -> &[(SkipReason, SnapshotRecord)] {
        &self.skipped
    }

    /// What each stage removed.
    #[must_use]
    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    /// Number of surviving records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates the surviving records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a FilteredSnapshotSet {
    type Item = &'a SnapshotRecord;
    type IntoIter = std::slice::Iter<'a, SnapshotRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Filter parameters. Built once per run and never mutated while filtering.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    from: Option<TimestampBound>,
    to: Option<TimestampBound>,
    excluded: HashSet<String>,
    latest_only: bool,
}

impl SnapshotFilter {
    /// A filter that keeps everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inclusive lower bound (`None` = unbounded).
    #[must_use]
    pub fn with_from(mut self, from: Option<TimestampBound>) -> Self {
        self.from = from;
        self
    }

    /// Sets the inclusive upper bound (`None` = unbounded).
    #[must_use]
    pub fn with_to(mut self, to: Option<TimestampBound>) -> Self {
        self.to = to;
        self
    }

    /// Adds exact timestamps to exclude.
    #[must_use]
    pub fn with_excluded<I>(mut self, timestamps: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.excluded.extend(timestamps);
        self
    }

    /// Keeps only the newest capture per URL when `true`.
    #[must_use]
    pub fn with_latest_only(mut self, latest_only: bool) -> Self {
        self.latest_only = latest_only;
        self
    }

    /// Whether `timestamp` falls inside the configured bounds.
    ///
    /// Bounds are prefix-matched, so `to = "2020"` admits every 2020 capture.
    #[must_use]
    pub fn in_range(&self, timestamp: &str) -> bool {
        let key = crate::config::pad_timestamp(timestamp, '0');
        let above_from = self.from.as_ref().is_none_or(|from| key >= from.lower_key());
        let below_to = self.to.as_ref().is_none_or(|to| key <= to.upper_key());
        above_from && below_to
    }

    /// Whether `timestamp` is explicitly excluded.
    #[must_use]
    pub fn is_excluded(&self, timestamp: &str) -> bool {
        self.excluded.contains(timestamp)
    }

    /// Applies range, exclusion and latest-only reduction, in that order.
    ///
    /// Relative order of the input is preserved. Under latest-only, each URL
    /// keeps the capture with the greatest timestamp (the later listing entry
    /// on ties) at the position where the URL first appeared.
    pub fn apply<I>(&self, records: I) -> FilteredSnapshotSet
    where
        I: IntoIterator<Item = SnapshotRecord>,
    {
        let mut stats = FilterStats::default();
        let mut kept = Vec::new();
        let mut skipped = Vec::new();

        for record in records {
            stats.input += 1;
            if !self.in_range(&record.timestamp) {
                stats.out_of_range += 1;
                skipped.push((SkipReason::OutOfRange, record));
                continue;
            }
            if self.is_excluded(&record.timestamp) {
                stats.excluded += 1;
                skipped.push((SkipReason::Excluded, record));
                continue;
            }
            kept.push(record);
        }

        if self.latest_only {
            let before = kept.len();
            let (latest, superseded) = keep_latest_per_url(kept);
            kept = latest;
            stats.superseded = superseded.len();
            skipped.extend(
                superseded
                    .into_iter()
                    .map(|record| (SkipReason::Superseded, record)),
            );
            info!(
                before,
                after = kept.len(),
                "filtered to latest version of each URL"
            );
        }

        if self.from.is_some() || self.to.is_some() {
            info!(
                input = stats.input,
                out_of_range = stats.out_of_range,
                "applied timestamp bounds"
            );
        }

        FilteredSnapshotSet {
            records: kept,
            skipped,
            stats,
        }
    }
}

/// Splits `records` into the newest capture per URL and the rest.
fn keep_latest_per_url(
    records: Vec<SnapshotRecord>,
) -> (Vec<SnapshotRecord>, Vec<SnapshotRecord>) {
    let mut slot_by_url: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<SnapshotRecord> = Vec::new();
    let mut superseded = Vec::new();

    for record in records {
        match slot_by_url.get(&record.original_url) {
            Some(&slot) => {
                if record.timestamp_key() >= latest[slot].timestamp_key() {
                    superseded.push(std::mem::replace(&mut latest[slot], record));
                } else {
                    superseded.push(record);
                }
            }
            None => {
                slot_by_url.insert(record.original_url.clone(), latest.len());
                latest.push(record);
            }
        }
    }
    (latest, superseded)
}
