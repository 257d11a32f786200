//! Application state management

use crate::coordinator::{PartitionStore, SearchCoordinator};
use crate::history::HistoryStore;
use crate::page::PageCache;
use crate::store::SqliteLibrary;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Default page cache capacity (number of rows)
const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Application state wiring one library to its two search domains
///
/// The coordinators are independent instances: a narrator search can run
/// while a book search is in flight, and neither can pause or stop the other.
pub struct AppState {
    pub library: Arc<SqliteLibrary>,
    pub book_search: Arc<SearchCoordinator>,
    pub narrator_search: Arc<SearchCoordinator>,
    pub page_cache: Arc<PageCache>,
    pub history: Arc<HistoryStore>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize application state from a library data directory
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        let library = Arc::new(SqliteLibrary::open(&data_dir)?);

        let book_search = Arc::new(SearchCoordinator::new(
            Arc::clone(&library) as Arc<dyn PartitionStore>,
        ));
        let narrator_search = Arc::new(SearchCoordinator::new(
            Arc::clone(&library) as Arc<dyn PartitionStore>,
        ));
        let page_cache = Arc::new(PageCache::new(Arc::clone(&library), DEFAULT_CACHE_CAPACITY));

        // Settings live next to the library so they survive corpus swaps
        let history = Arc::new(HistoryStore::open(data_dir.join("settings.db"))?);

        Ok(Self {
            library,
            book_search,
            narrator_search,
            page_cache,
            history,
            data_dir,
        })
    }
}

/// Get the library data directory
///
/// - `MAKTABA_DATA` env var, when set
/// - macOS: ~/Library/Application Support/Maktaba/
/// - elsewhere: data folder next to the executable (portable)
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MAKTABA_DATA") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("Maktaba");
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join("data");
        }
    }

    PathBuf::from("data")
}
