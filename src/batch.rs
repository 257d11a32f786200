//! Result batching between the scan workers and the consumer
//!
//! Matches arrive one row at a time; consumers (a UI results table) want
//! coarser delivery. The batcher accumulates up to a fixed threshold and
//! flushes as one atomic unit, preserving FIFO order. It does not
//! deduplicate or reorder.

use crate::scanner::MatchResult;

/// Default number of results delivered per batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

pub struct ResultBatcher {
    buffer: Vec<MatchResult>,
    threshold: usize,
}

impl ResultBatcher {
    pub fn new(threshold: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(threshold.max(1)),
            threshold: threshold.max(1),
        }
    }

    pub fn add(&mut self, result: MatchResult) {
        self.buffer.push(result);
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.threshold
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Take the buffered results in insertion order, leaving the batcher empty
    pub fn flush(&mut self) -> Vec<MatchResult> {
        std::mem::take(&mut self.buffer)
    }
}

impl Default for ResultBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
