//! Maktaba - Reference Library Reader Backend
//!
//! Streaming full-text search across per-book content stores, with
//! cooperative pause/resume, cancellation, and two-level progress reporting.

// Normalization and control primitives come first as everything builds on them
pub mod normalize;
pub mod control;
pub mod highlight;
pub mod scanner;
pub mod batch;
pub mod coordinator;
pub mod store;
pub mod page;
pub mod history;
pub mod error;
pub mod state;

pub use error::MaktabaError;
pub use state::{get_data_dir, AppState};
pub use control::{control_pair, CancellationScope, PauseGate};
pub use normalize::{normalize_arabic, MatchMode, MatchPredicate};
pub use highlight::{HighlightedText, MatchSpan};
pub use scanner::{
    ContentRow, MatchResult, PartitionId, PartitionScanner, RowSource, ScanOutcome, ScanSink,
};
pub use batch::ResultBatcher;
pub use coordinator::{
    ChannelEvents, PartitionStore, ProgressSnapshot, RunOutcome, SearchCoordinator, SearchEvent,
    SearchEvents, SearchRequest, SearchState,
};
pub use store::{SourceEntry, SourceKind, SqliteLibrary};
pub use page::{PageCache, PageKey};
pub use history::{HistoryStore, SavedSearchEntry, SearchHistoryEntry};
