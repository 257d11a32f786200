//! Search run orchestration across content partitions
//!
//! One `SearchCoordinator` drives one search domain (book content, narrator
//! biographies). A run scans the requested partitions sequentially on a
//! dedicated worker thread, streaming batched results and two-level progress
//! to the caller through [`SearchEvents`]. Pause, resume and stop act on the
//! run's [`PauseGate`]/[`CancellationScope`] pair. Coordinators are
//! self-contained: the application wires one instance per domain and two
//! instances never share mutable state.

use crate::batch::ResultBatcher;
use crate::control::{control_pair, CancellationScope, PauseGate};
use crate::error::MaktabaError;
use crate::normalize::{MatchMode, MatchPredicate};
use crate::scanner::{
    MatchResult, PartitionId, PartitionScanner, RowSource, ScanOutcome, ScanSink,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Storage collaborator: resolves partitions to titles and row sequences
pub trait PartitionStore: Send + Sync {
    /// Display title for a partition (book or collection title)
    fn partition_title(&self, partition: &PartitionId) -> String;

    /// Open the lazy row sequence for one partition
    fn open_rows(&self, partition: &PartitionId) -> anyhow::Result<Box<dyn RowSource + Send>>;
}

/// Immutable description of one search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub mode: MatchMode,
    /// Partition set; order is irrelevant, duplicates are ignored
    pub partitions: Vec<PartitionId>,
    #[serde(default)]
    pub result_limit: Option<usize>,
}

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchState {
    Idle,
    Running,
    Paused,
    Stopping,
    Completed,
}

/// How a run ended: natural exhaustion (or result limit) vs. external stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Stopped,
}

/// Two-level progress: completed partitions, plus rows within the partition
/// currently being scanned. Row counters reset when a new partition starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub partitions_completed: usize,
    pub partitions_total: usize,
    pub rows_scanned: u64,
    pub rows_total: u64,
}

#[derive(Default)]
struct ProgressCells {
    partitions_completed: AtomicUsize,
    partitions_total: AtomicUsize,
    rows_scanned: AtomicU64,
    rows_total: AtomicU64,
}

impl ProgressCells {
    fn reset(&self, partitions_total: usize) {
        self.partitions_completed.store(0, Ordering::Relaxed);
        self.partitions_total
            .store(partitions_total, Ordering::Relaxed);
        self.rows_scanned.store(0, Ordering::Relaxed);
        self.rows_total.store(0, Ordering::Relaxed);
    }

    fn begin_partition(&self) {
        self.rows_scanned.store(0, Ordering::Relaxed);
        self.rows_total.store(0, Ordering::Relaxed);
    }

    fn set_rows(&self, current: u64, total: u64) {
        self.rows_scanned.store(current, Ordering::Relaxed);
        self.rows_total.store(total, Ordering::Relaxed);
    }

    fn complete_partition(&self) {
        self.partitions_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            partitions_completed: self.partitions_completed.load(Ordering::Relaxed),
            partitions_total: self.partitions_total.load(Ordering::Relaxed),
            rows_scanned: self.rows_scanned.load(Ordering::Relaxed),
            rows_total: self.rows_total.load(Ordering::Relaxed),
        }
    }
}

/// Consumer callbacks for one run. All methods are invoked from the run's
/// worker thread, serialized and in order; a GUI consumer marshals to its UI
/// thread itself. Batches are atomic delivery units and never interleave.
pub trait SearchEvents: Send {
    fn on_initialize(&mut self, _partitions_total: usize) {}
    fn on_table_progress(&mut self, _completed: usize) {}
    fn on_row_progress(&mut self, _partition: &PartitionId, _current: u64, _total: u64) {}
    fn on_batch(&mut self, _results: Vec<MatchResult>) {}
    /// Out-of-band diagnostics for partitions that could not be read;
    /// the run continues without them
    fn on_partition_error(&mut self, _partition: &PartitionId, _message: &str) {}
    /// Fires exactly once per run, after the final batch flush
    fn on_complete(&mut self, _outcome: RunOutcome) {}
}

/// Owned event for channel-based consumers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Initialized {
        partitions_total: usize,
    },
    TableProgress {
        completed: usize,
    },
    RowProgress {
        partition: PartitionId,
        current: u64,
        total: u64,
    },
    Batch {
        results: Vec<MatchResult>,
    },
    PartitionError {
        partition: PartitionId,
        message: String,
    },
    Complete {
        outcome: RunOutcome,
    },
}

/// Forwards events into a tokio channel; send errors are ignored so an
/// abandoned receiver never stalls the run
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<SearchEvent>,
}

impl ChannelEvents {
    pub fn new(tx: mpsc::UnboundedSender<SearchEvent>) -> Self {
        Self { tx }
    }
}

impl SearchEvents for ChannelEvents {
    fn on_initialize(&mut self, partitions_total: usize) {
        let _ = self.tx.send(SearchEvent::Initialized { partitions_total });
    }

    fn on_table_progress(&mut self, completed: usize) {
        let _ = self.tx.send(SearchEvent::TableProgress { completed });
    }

    fn on_row_progress(&mut self, partition: &PartitionId, current: u64, total: u64) {
        let _ = self.tx.send(SearchEvent::RowProgress {
            partition: partition.clone(),
            current,
            total,
        });
    }

    fn on_batch(&mut self, results: Vec<MatchResult>) {
        let _ = self.tx.send(SearchEvent::Batch { results });
    }

    fn on_partition_error(&mut self, partition: &PartitionId, message: &str) {
        let _ = self.tx.send(SearchEvent::PartitionError {
            partition: partition.clone(),
            message: message.to_string(),
        });
    }

    fn on_complete(&mut self, outcome: RunOutcome) {
        let _ = self.tx.send(SearchEvent::Complete { outcome });
    }
}

pub struct SearchCoordinator {
    store: Arc<dyn PartitionStore>,
    state: Arc<Mutex<SearchState>>,
    progress: Arc<ProgressCells>,
    controls: Mutex<Option<(PauseGate, CancellationScope)>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SearchCoordinator {
    pub fn new(store: Arc<dyn PartitionStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(SearchState::Idle)),
            progress: Arc::new(ProgressCells::default()),
            controls: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Begin a run on a dedicated worker thread.
    ///
    /// Fails without side effects if a run is active or the request is
    /// unusable (blank query, zero result limit).
    pub fn start(
        &self,
        mut request: SearchRequest,
        events: Box<dyn SearchEvents>,
    ) -> Result<(), MaktabaError> {
        if request.query.trim().is_empty() {
            return Err(MaktabaError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        if request.result_limit == Some(0) {
            return Err(MaktabaError::InvalidQuery(
                "result limit must be positive".to_string(),
            ));
        }

        {
            let mut state = self.state.lock().unwrap();
            if *state != SearchState::Idle {
                return Err(MaktabaError::SearchActive);
            }
            *state = SearchState::Running;
        }

        // The previous run already reached Idle; reap its thread
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }

        // Stable order for reproducible progress; the request is a set
        request.partitions.sort();
        request.partitions.dedup();

        self.progress.reset(request.partitions.len());
        let (gate, cancel) = control_pair();
        *self.controls.lock().unwrap() = Some((gate.clone(), cancel.clone()));

        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let progress = Arc::clone(&self.progress);
        let spawned = thread::Builder::new()
            .name("maktaba-search".to_string())
            .spawn(move || run_search(store, state, progress, gate, cancel, request, events));

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap() = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.state.lock().unwrap() = SearchState::Idle;
                Err(MaktabaError::Search(e.to_string()))
            }
        }
    }

    /// Freeze forward progress at the next row boundary. No-op unless running.
    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SearchState::Running {
            if let Some((gate, _)) = self.controls.lock().unwrap().as_ref() {
                gate.pause();
            }
            *state = SearchState::Paused;
        }
    }

    /// Resume a paused run from exactly where it left off
    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SearchState::Paused {
            if let Some((gate, _)) = self.controls.lock().unwrap().as_ref() {
                gate.resume();
            }
            *state = SearchState::Running;
        }
    }

    /// Request a stop. Workers observe it within one row; anyone parked in
    /// the pause gate is released. No-op unless running or paused.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                SearchState::Running | SearchState::Paused => *state = SearchState::Stopping,
                _ => return,
            }
        }
        if let Some((gate, cancel)) = self.controls.lock().unwrap().as_ref() {
            cancel.request_stop();
            gate.resume();
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.state.lock().unwrap() == SearchState::Paused
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().unwrap(),
            SearchState::Running | SearchState::Paused | SearchState::Stopping
        )
    }

    pub fn state(&self) -> SearchState {
        *self.state.lock().unwrap()
    }

    /// Point-in-time progress, readable from any thread
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Block until the current run (if any) has fully wound down
    pub fn wait_until_idle(&self) {
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Batches matches, forwards progress, and enforces the result limit for the
/// partition currently being scanned
struct WorkerSink<'a> {
    partition: &'a PartitionId,
    batcher: &'a mut ResultBatcher,
    events: &'a mut dyn SearchEvents,
    progress: &'a ProgressCells,
    produced: &'a mut usize,
    limit: Option<usize>,
}

impl ScanSink for WorkerSink<'_> {
    fn on_row_progress(&mut self, current: u64, total: u64) {
        self.progress.set_rows(current, total);
        self.events.on_row_progress(self.partition, current, total);
    }

    fn on_match(&mut self, result: MatchResult) -> bool {
        self.batcher.add(result);
        *self.produced += 1;
        if self.batcher.is_full() {
            self.events.on_batch(self.batcher.flush());
        }
        match self.limit {
            Some(limit) => *self.produced < limit,
            None => true,
        }
    }
}

fn run_search(
    store: Arc<dyn PartitionStore>,
    state: Arc<Mutex<SearchState>>,
    progress: Arc<ProgressCells>,
    gate: PauseGate,
    cancel: CancellationScope,
    request: SearchRequest,
    mut events: Box<dyn SearchEvents>,
) {
    let predicate = MatchPredicate::new(&request.query, request.mode);
    let scanner = PartitionScanner::new(&gate, &cancel);
    let mut batcher = ResultBatcher::default();
    let mut produced = 0usize;
    let mut completed = 0usize;
    let mut stopped = false;

    debug!(
        partitions = request.partitions.len(),
        mode = ?request.mode,
        "search run starting"
    );
    events.on_initialize(request.partitions.len());

    for partition in &request.partitions {
        if cancel.is_stop_requested() {
            stopped = true;
            break;
        }
        gate.wait_if_paused();
        if cancel.is_stop_requested() {
            stopped = true;
            break;
        }

        progress.begin_partition();
        let title = store.partition_title(partition);

        let outcome = match store.open_rows(partition) {
            Ok(mut source) => {
                let mut sink = WorkerSink {
                    partition,
                    batcher: &mut batcher,
                    events: events.as_mut(),
                    progress: progress.as_ref(),
                    produced: &mut produced,
                    limit: request.result_limit,
                };
                match scanner.scan(partition, &title, &predicate, source.as_mut(), &mut sink) {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        warn!(partition = %partition, %error, "partition scan failed, contributing no further matches");
                        events.on_partition_error(partition, &error.to_string());
                        ScanOutcome::Completed
                    }
                }
            }
            Err(error) => {
                warn!(partition = %partition, %error, "partition could not be opened, skipping");
                events.on_partition_error(partition, &error.to_string());
                ScanOutcome::Completed
            }
        };

        // Don't hold a partial batch across partition boundaries
        if !batcher.is_empty() {
            events.on_batch(batcher.flush());
        }

        match outcome {
            ScanOutcome::Completed => {
                completed += 1;
                progress.complete_partition();
                events.on_table_progress(completed);
            }
            ScanOutcome::Aborted => {
                stopped = true;
                break;
            }
        }

        if request.result_limit.is_some_and(|limit| produced >= limit) {
            break;
        }
    }

    // Pre-stop buffered results are still delivered; nothing after this
    if !batcher.is_empty() {
        events.on_batch(batcher.flush());
    }

    let outcome = if stopped {
        RunOutcome::Stopped
    } else {
        *state.lock().unwrap() = SearchState::Completed;
        RunOutcome::Completed
    };
    debug!(?outcome, produced, completed, "search run finished");
    events.on_complete(outcome);
    *state.lock().unwrap() = SearchState::Idle;
}
