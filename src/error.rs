//! Error types for Maktaba

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaktabaError {
    #[error("Search error: {0}")]
    Search(String),

    #[error("A search is already running")]
    SearchActive,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Library not ready: {0}")]
    LibraryNotReady(String),

    #[error("{0}")]
    Other(String),
}

impl serde::Serialize for MaktabaError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
