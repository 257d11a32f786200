//! Page caching with LRU eviction, loads from the archive files
//!
//! The reader view re-requests the same pages constantly while the user
//! flips back and forth; rows are immutable, so a small LRU in front of the
//! archives removes almost all repeat reads.

use crate::scanner::{ContentRow, PartitionId};
use crate::store::SqliteLibrary;
use anyhow::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PageKey {
    pub partition: PartitionId,
    pub row_id: i64,
}

impl PageKey {
    pub fn new(partition: PartitionId, row_id: i64) -> Self {
        Self { partition, row_id }
    }
}

pub struct PageCache {
    cache: Mutex<LruCache<PageKey, Arc<ContentRow>>>,
    library: Arc<SqliteLibrary>,
}

impl PageCache {
    pub fn new(library: Arc<SqliteLibrary>, capacity: usize) -> Self {
        let capacity =
            NonZeroUsize::new(capacity).unwrap_or_else(|| NonZeroUsize::new(1000).unwrap());
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            library,
        }
    }

    pub fn get(&self, key: &PageKey) -> Result<Option<Arc<ContentRow>>> {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(row) = cache.get(key) {
                return Ok(Some(Arc::clone(row)));
            }
        }

        let Some(row) = self.library.load_row(&key.partition, key.row_id)? else {
            return Ok(None);
        };
        let row = Arc::new(row);
        {
            let mut cache = self.cache.lock().unwrap();
            cache.put(key.clone(), Arc::clone(&row));
        }
        Ok(Some(row))
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }

    pub fn stats(&self) -> (usize, usize) {
        let cache = self.cache.lock().unwrap();
        (cache.len(), cache.cap().get())
    }
}
