//! Tag counting and merging
//!
//! This module holds the per-process tally and the coordinator-side merge:
//!
//! - [`WorkUnit`]: raw bytes of one log file, owned by the process parsing it
//! - [`TagCount`]: tag → count mapping (partial or global)
//! - [`WorkerAggregator`]: feeds work units through the tag extractor
//! - [`RankedReport`]: merged counts ordered by count, descending
//!
//! # Example
//!
//! ```
//! use logtally::aggregate::{TagCount, WorkUnit, WorkerAggregator};
//!
//! let mut worker = WorkerAggregator::new();
//! worker.ingest(WorkUnit::new(b"sshd[1]: Failed password for root\n".to_vec()));
//! worker.ingest(WorkUnit::new(Vec::new()));
//!
//! let mut global = TagCount::new();
//! global.merge(worker.snapshot()).unwrap();
//!
//! let report = global.rank();
//! assert_eq!(report.entries(), &[("Failed password".to_string(), 1)]);
//! ```

use crate::error::{Result, TallyError};
use crate::parser;
use std::collections::btree_map::{self, BTreeMap};

/// Raw content of one log file
///
/// Dropped as soon as it has been parsed or handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkUnit {
    bytes: Vec<u8>,
}

impl WorkUnit {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for WorkUnit {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Mapping from tag to occurrence count
///
/// Keys are kept in byte order so iteration (and the encoded form) is
/// deterministic. Counts never go below zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagCount {
    counts: BTreeMap<String, u64>,
}

impl TagCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `tag`
    pub fn increment(&mut self, tag: impl Into<String>) {
        let count = self.counts.entry(tag.into()).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Add `count` occurrences of `tag`, inserting it if unseen
    ///
    /// Fails with `CorruptPayload` if the sum does not fit a `u64`; the
    /// mapping is left unchanged in that case.
    pub fn add(&mut self, tag: impl Into<String>, count: u64) -> Result<()> {
        let tag = tag.into();
        let current = self.get(&tag);
        let sum = current.checked_add(count).ok_or_else(|| {
            TallyError::CorruptPayload(format!(
                "count overflow for tag '{}': {} + {}",
                tag, current, count
            ))
        })?;
        self.counts.insert(tag, sum);
        Ok(())
    }

    /// Current count for `tag` (0 if never seen)
    pub fn get(&self, tag: &str) -> u64 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Merge another mapping into this one
    ///
    /// Counts for shared keys are summed, other keys are unioned. Merging is
    /// commutative and an empty mapping is the identity. A sum that overflows
    /// `u64` is a `CorruptPayload`.
    pub fn merge(&mut self, other: TagCount) -> Result<()> {
        for (tag, count) in other.counts {
            self.add(tag, count)?;
        }
        Ok(())
    }

    /// Number of distinct tags
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0, |acc, &n| acc.saturating_add(n))
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, u64> {
        self.counts.iter()
    }

    /// Consume the mapping into a report ordered by count, descending
    ///
    /// Equal counts keep key order, i.e. tag ascending.
    pub fn rank(self) -> RankedReport {
        let mut entries: Vec<(String, u64)> = self.counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        RankedReport { entries }
    }
}

impl IntoIterator for TagCount {
    type Item = (String, u64);
    type IntoIter = btree_map::IntoIter<String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

impl<'a> IntoIterator for &'a TagCount {
    type Item = (&'a String, &'a u64);
    type IntoIter = btree_map::Iter<'a, String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}

/// Repeated tags are summed, saturating at `u64::MAX`
impl<S: Into<String>> FromIterator<(S, u64)> for TagCount {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = BTreeMap::new();
        for (tag, count) in iter {
            let entry: &mut u64 = counts.entry(tag.into()).or_insert(0);
            *entry = entry.saturating_add(count);
        }
        TagCount { counts }
    }
}

/// Merge two partial results into a new one
pub fn merge(mut a: TagCount, b: TagCount) -> Result<TagCount> {
    a.merge(b)?;
    Ok(a)
}

/// Per-process tag tally
///
/// Each process (coordinator included) owns exactly one of these for the run.
#[derive(Debug, Default)]
pub struct WorkerAggregator {
    counts: TagCount,
    units: usize,
    bytes: u64,
}

impl WorkerAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one work unit and count its tags
    ///
    /// Empty units are legitimate (empty log files) and contribute nothing.
    pub fn ingest(&mut self, unit: WorkUnit) {
        self.units += 1;
        if unit.is_empty() {
            return;
        }

        self.bytes += unit.len() as u64;
        for tag in parser::extract(unit.as_bytes()) {
            self.counts.increment(tag);
        }
    }

    /// Copy of the current tally
    pub fn snapshot(&self) -> TagCount {
        self.counts.clone()
    }

    /// Consume the aggregator, yielding its tally
    pub fn into_counts(self) -> TagCount {
        self.counts
    }

    /// Number of units ingested (including empty ones)
    pub fn units(&self) -> usize {
        self.units
    }

    /// Number of bytes parsed
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Final merged counts ordered by count, descending
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RankedReport {
    entries: Vec<(String, u64)>,
}

impl RankedReport {
    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts in the report, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.entries.iter().fold(0, |acc, (_, n)| acc.saturating_add(*n))
    }

    /// At most the first `n` entries
    pub fn top(&self, n: usize) -> &[(String, u64)] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, u64)> {
        self.entries.iter()
    }
}
