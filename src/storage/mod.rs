//! Storage module for persisting crawl sessions
//!
//! This module handles:
//! - Versioned JSON checkpoints of the whole session
//! - Optional SQLite storage for captured bodies
//! - Atomic replacement of checkpoint files

mod atomic;
mod body_store;
mod checkpoint;
mod schema;

pub use atomic::write_atomically;
pub use body_store::{BodyStore, MemoryBodyStore, SqliteBodyStore};
pub use checkpoint::{Checkpointer, CHECKPOINT_FORMAT_VERSION};

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt checkpoint: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported checkpoint format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Frontier entry is not a registered resource: {0}")]
    FrontierNotRegistered(String),

    #[error("Frontier entry {url} is {state}, expected unfetched")]
    FrontierNotUnfetched { url: String, state: &'static str },

    #[error("Invalid checkpoint record: {0}")]
    InvalidRecord(String),

    #[error("Body of {0} is missing from the body store")]
    MissingBody(String),

    #[error("Body digest mismatch for {url}: expected {expected}, found {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid body encoding for {url}: {reason}")]
    InvalidBody { url: String, reason: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Builds the checkpointer for a run
///
/// # Arguments
///
/// * `body_store_path` - SQLite body store location; bodies stay inline when None
pub fn open_checkpointer(body_store_path: Option<&Path>) -> StorageResult<Checkpointer> {
    match body_store_path {
        Some(path) => Ok(Checkpointer::with_body_store(Box::new(SqliteBodyStore::new(
            path,
        )?))),
        None => Ok(Checkpointer::inline()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_inline_checkpointer() {
        let checkpointer = open_checkpointer(None).unwrap();
        assert!(checkpointer.body_store().is_none());
    }

    #[test]
    fn test_open_checkpointer_with_store() {
        let dir = TempDir::new().unwrap();
        let checkpointer = open_checkpointer(Some(&dir.path().join("bodies.db"))).unwrap();
        assert!(checkpointer.body_store().is_some());
    }

    #[test]
    fn test_error_messages() {
        let err = StorageError::UnsupportedVersion {
            found: 2,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported checkpoint format version 2 (supported: 1)"
        );
    }
}
