//! SQLite-backed content storage
//!
//! A library data directory holds `library.db` (the catalog, one row per
//! source) plus archive files under `archives/`; each archive is a SQLite
//! database holding one content table per book or biography collection. A
//! partition is the (archive, table) pair. Scans open their own read-only
//! connection, so any number of scans can run against the same archive.

use crate::coordinator::PartitionStore;
use crate::scanner::{ContentRow, PartitionId, RowSource};
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Rows fetched per batch while scanning a content table
const FETCH_BATCH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Book,
    Quran,
    Narrators,
}

impl SourceKind {
    fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Book => "book",
            SourceKind::Quran => "quran",
            SourceKind::Narrators => "narrators",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "book" => Some(SourceKind::Book),
            "quran" => Some(SourceKind::Quran),
            "narrators" => Some(SourceKind::Narrators),
            _ => None,
        }
    }
}

/// Catalog entry for one content source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub id: i64,
    pub kind: SourceKind,
    pub title: String,
    pub archive: String,
    pub table_name: String,
    pub row_count: i64,
}

pub struct SqliteLibrary {
    data_dir: PathBuf,
    catalog: HashMap<PartitionId, SourceEntry>,
}

impl SqliteLibrary {
    /// Open an existing library directory and load its catalog
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let catalog_path = data_dir.join("library.db");
        if !catalog_path.exists() {
            bail!("no library catalog at {:?}", catalog_path);
        }

        let conn = Connection::open(&catalog_path)
            .with_context(|| format!("failed to open catalog at {:?}", catalog_path))?;
        let mut stmt = conn
            .prepare("SELECT id, kind, title, archive, table_name, row_count FROM sources")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut catalog = HashMap::new();
        for row in rows {
            let (id, kind, title, archive, table_name, row_count) = row?;
            let Some(kind) = SourceKind::parse(&kind) else {
                warn!(id, kind = %kind, "unknown source kind in catalog, skipping");
                continue;
            };
            let entry = SourceEntry {
                id,
                kind,
                title,
                archive,
                table_name,
                row_count,
            };
            catalog.insert(
                PartitionId::new(&entry.archive, &entry.table_name),
                entry,
            );
        }

        Ok(Self { data_dir, catalog })
    }

    /// Create an empty library directory (catalog plus archives folder)
    pub fn create(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(data_dir.join("archives"))
            .with_context(|| format!("failed to create library at {:?}", data_dir))?;

        let conn = Connection::open(data_dir.join("library.db"))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                archive TEXT NOT NULL,
                table_name TEXT NOT NULL,
                row_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE(archive, table_name)
            );

            CREATE INDEX IF NOT EXISTS idx_sources_kind ON sources(kind);
            "#,
        )?;

        Ok(Self {
            data_dir,
            catalog: HashMap::new(),
        })
    }

    /// Import one source: create its content table, insert the rows, and
    /// register it in the catalog. `rows` are (text, page, part) triples.
    pub fn import_source(
        &mut self,
        kind: SourceKind,
        title: &str,
        archive: &str,
        table_name: &str,
        rows: &[(&str, i64, i64)],
    ) -> Result<PartitionId> {
        if !is_safe_identifier(table_name) {
            bail!("invalid table name {table_name:?}");
        }
        if !is_safe_archive_name(archive) {
            bail!("invalid archive name {archive:?}");
        }

        let path = self.archive_path(archive);
        let mut conn = Connection::open(&path)
            .with_context(|| format!("failed to open archive {:?}", path))?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table_name}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nass TEXT NOT NULL,
                page INTEGER NOT NULL DEFAULT 0,
                part INTEGER NOT NULL DEFAULT 0
            );
            "#
        ))?;

        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(&format!(
                r#"INSERT INTO "{table_name}" (nass, page, part) VALUES (?1, ?2, ?3)"#
            ))?;
            for (text, page, part) in rows {
                insert.execute(rusqlite::params![text, page, part])?;
            }
        }
        tx.commit()?;

        let catalog_conn = Connection::open(self.data_dir.join("library.db"))?;
        catalog_conn.execute(
            "INSERT OR REPLACE INTO sources (kind, title, archive, table_name, row_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![kind.as_str(), title, archive, table_name, rows.len() as i64],
        )?;
        let id = catalog_conn.last_insert_rowid();

        let partition = PartitionId::new(archive, table_name);
        self.catalog.insert(
            partition.clone(),
            SourceEntry {
                id,
                kind,
                title: title.to_string(),
                archive: archive.to_string(),
                table_name: table_name.to_string(),
                row_count: rows.len() as i64,
            },
        );
        Ok(partition)
    }

    /// All partitions of the given kinds, in stable sorted order
    pub fn partitions(&self, kinds: &[SourceKind]) -> Vec<PartitionId> {
        let mut out: Vec<PartitionId> = self
            .catalog
            .iter()
            .filter(|(_, entry)| kinds.contains(&entry.kind))
            .map(|(partition, _)| partition.clone())
            .collect();
        out.sort();
        out
    }

    /// Partitions for the book-content search domain
    pub fn book_partitions(&self) -> Vec<PartitionId> {
        self.partitions(&[SourceKind::Book, SourceKind::Quran])
    }

    /// Partitions for the narrator-biography search domain
    pub fn narrator_partitions(&self) -> Vec<PartitionId> {
        self.partitions(&[SourceKind::Narrators])
    }

    pub fn entry(&self, partition: &PartitionId) -> Option<&SourceEntry> {
        self.catalog.get(partition)
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceEntry> {
        self.catalog.values()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Fetch one row by id, for the reader view
    pub fn load_row(
        &self,
        partition: &PartitionId,
        row_id: i64,
    ) -> Result<Option<ContentRow>> {
        let entry = self
            .catalog
            .get(partition)
            .ok_or_else(|| anyhow!("partition {partition} not in catalog"))?;
        let conn = self.open_archive(&entry.archive)?;
        let sql = format!(
            r#"SELECT id, nass, page, part FROM "{}" WHERE id = ?1"#,
            entry.table_name
        );
        let row = conn
            .query_row(&sql, [row_id], |row| {
                Ok(ContentRow {
                    row_id: row.get(0)?,
                    text: row.get(1)?,
                    page: row.get(2)?,
                    part: row.get(3)?,
                })
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(row)
    }

    fn archive_path(&self, archive: &str) -> PathBuf {
        self.data_dir.join("archives").join(archive)
    }

    fn open_archive(&self, archive: &str) -> Result<Connection> {
        let path = self.archive_path(archive);
        Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open archive {:?}", path))
    }
}

impl PartitionStore for SqliteLibrary {
    fn partition_title(&self, partition: &PartitionId) -> String {
        self.catalog
            .get(partition)
            .map(|entry| entry.title.clone())
            .unwrap_or_else(|| partition.table.clone())
    }

    fn open_rows(&self, partition: &PartitionId) -> Result<Box<dyn RowSource + Send>> {
        let entry = self
            .catalog
            .get(partition)
            .ok_or_else(|| anyhow!("partition {partition} not in catalog"))?;
        if !is_safe_identifier(&entry.table_name) {
            bail!("invalid table name {:?}", entry.table_name);
        }
        let conn = self.open_archive(&entry.archive)?;
        Ok(Box::new(SqliteRows {
            conn,
            table: entry.table_name.clone(),
            last_id: 0,
            pending: VecDeque::new(),
            exhausted: false,
        }))
    }
}

/// Lazy cursor over one content table, fetching in id-ordered batches
struct SqliteRows {
    conn: Connection,
    table: String,
    last_id: i64,
    pending: VecDeque<ContentRow>,
    exhausted: bool,
}

impl SqliteRows {
    fn refill(&mut self) -> Result<()> {
        let sql = format!(
            r#"SELECT id, nass, page, part FROM "{}" WHERE id > ?1 ORDER BY id LIMIT {}"#,
            self.table, FETCH_BATCH
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([self.last_id], |row| {
            Ok(ContentRow {
                row_id: row.get(0)?,
                text: row.get(1)?,
                page: row.get(2)?,
                part: row.get(3)?,
            })
        })?;
        for row in rows {
            let row = row?;
            self.last_id = row.row_id;
            self.pending.push_back(row);
        }
        if self.pending.len() < FETCH_BATCH {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl RowSource for SqliteRows {
    fn total_rows(&mut self) -> Result<u64> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}""#, self.table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn next_row(&mut self) -> Result<Option<ContentRow>> {
        if self.pending.is_empty() && !self.exhausted {
            self.refill()?;
        }
        Ok(self.pending.pop_front())
    }
}

/// Table names come from the catalog, but they are interpolated into SQL,
/// so they are restricted to plain identifiers
fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().next().unwrap_or('0').is_ascii_digit()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Archive names are file names inside the archives directory, never paths
fn is_safe_archive_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}
