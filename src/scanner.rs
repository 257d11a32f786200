//! Per-partition row scanning

use crate::control::{CancellationScope, PauseGate};
use crate::highlight::{self, HighlightedText};
use crate::normalize::{normalize_arabic, MatchPredicate};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one scannable content source: an archive file plus the content
/// table inside it holding a single book or biography collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId {
    pub archive: String,
    pub table: String,
}

impl PartitionId {
    pub fn new(archive: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.archive, self.table)
    }
}

/// One content row supplied by the storage collaborator. Rows are ephemeral:
/// tested against the predicate and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRow {
    pub row_id: i64,
    pub text: String,
    pub page: i64,
    pub part: i64,
}

/// Lazy row sequence for one partition
pub trait RowSource {
    /// Total row count, used as the row-progress denominator
    fn total_rows(&mut self) -> Result<u64>;

    /// Next row in storage order, or `None` when exhausted
    fn next_row(&mut self) -> Result<Option<ContentRow>>;
}

/// A single delivered match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub partition: PartitionId,
    pub row_id: i64,
    pub title: String,
    pub page: i64,
    pub part: i64,
    pub highlighted: HighlightedText,
}

/// How a partition scan ended. `Aborted` is the expected result of a stop
/// request, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Aborted,
}

/// Receives a scan's per-row progress and matches
pub trait ScanSink {
    fn on_row_progress(&mut self, current: u64, total: u64);

    /// Return `false` once no further matches are needed; the scan then ends
    /// as `Completed` (used to enforce result limits)
    fn on_match(&mut self, result: MatchResult) -> bool;
}

/// Scans one partition row by row, honoring the run's gate and stop scope.
///
/// Never buffers more than the current row; matches and progress leave
/// through the sink.
pub struct PartitionScanner<'a> {
    gate: &'a PauseGate,
    cancel: &'a CancellationScope,
}

impl<'a> PartitionScanner<'a> {
    pub fn new(gate: &'a PauseGate, cancel: &'a CancellationScope) -> Self {
        Self { gate, cancel }
    }

    pub fn scan(
        &self,
        partition: &PartitionId,
        title: &str,
        predicate: &MatchPredicate,
        source: &mut dyn RowSource,
        sink: &mut dyn ScanSink,
    ) -> Result<ScanOutcome> {
        let total = source.total_rows()?;
        let mut scanned = 0u64;

        loop {
            if self.cancel.is_stop_requested() {
                return Ok(ScanOutcome::Aborted);
            }
            self.gate.wait_if_paused();
            // A stop issued while paused wakes the gate without resuming
            if self.cancel.is_stop_requested() {
                return Ok(ScanOutcome::Aborted);
            }

            let Some(row) = source.next_row()? else {
                break;
            };
            scanned += 1;

            if predicate.matches(&normalize_arabic(&row.text)) {
                let result = MatchResult {
                    partition: partition.clone(),
                    row_id: row.row_id,
                    title: title.to_string(),
                    page: row.page,
                    part: row.part,
                    highlighted: highlight::render(&row.text, predicate.normalized_query()),
                };
                if !sink.on_match(result) {
                    sink.on_row_progress(scanned, total);
                    return Ok(ScanOutcome::Completed);
                }
            }
            sink.on_row_progress(scanned, total);
        }

        Ok(ScanOutcome::Completed)
    }
}
