//! External storage for captured response bodies
//!
//! Bodies can be large, so a checkpoint may keep only their digest and leave
//! the bytes to a body store. The store is keyed by canonical URL; each
//! resource has at most one body.

use crate::state::Body;
use crate::storage::schema::initialize_schema;
use crate::storage::StorageResult;
use crate::url::CanonicalUrl;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// Trait for body storage backends
pub trait BodyStore: Send {
    // ===== Writes =====

    /// Stores the body of a resource, replacing any previous one
    ///
    /// # Returns
    ///
    /// The hex SHA-256 digest of the stored body
    fn put(&mut self, url: &CanonicalUrl, body: &Body) -> StorageResult<String>;

    // ===== Reads =====

    /// Gets the body of a resource, if stored
    fn get(&self, url: &CanonicalUrl) -> StorageResult<Option<Body>>;

    /// Gets the digest of the stored body without loading it
    fn digest(&self, url: &CanonicalUrl) -> StorageResult<Option<String>>;

    /// Checks whether a body is stored for the URL
    fn contains(&self, url: &CanonicalUrl) -> StorageResult<bool> {
        Ok(self.digest(url)?.is_some())
    }

    /// Number of stored bodies
    fn len(&self) -> StorageResult<usize>;

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// SQLite body store backend
pub struct SqliteBodyStore {
    conn: Connection,
}

impl SqliteBodyStore {
    /// Opens or creates a body store database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl BodyStore for SqliteBodyStore {
    fn put(&mut self, url: &CanonicalUrl, body: &Body) -> StorageResult<String> {
        let digest = body.sha256_hex();

        // Unchanged bodies are not rewritten
        if self.digest(url)?.as_deref() == Some(digest.as_str()) {
            return Ok(digest);
        }

        self.conn.execute(
            "INSERT INTO bodies (url, sha256, body, stored_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO UPDATE SET
                sha256 = excluded.sha256,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![url.as_str(), digest, body.as_bytes(), Utc::now().to_rfc3339()],
        )?;
        Ok(digest)
    }

    fn get(&self, url: &CanonicalUrl) -> StorageResult<Option<Body>> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT body FROM bodies WHERE url = ?1",
                params![url.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.map(Body::new))
    }

    fn digest(&self, url: &CanonicalUrl) -> StorageResult<Option<String>> {
        let digest = self
            .conn
            .query_row(
                "SELECT sha256 FROM bodies WHERE url = ?1",
                params![url.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(digest)
    }

    fn len(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM bodies", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// In-memory body store
#[derive(Debug, Default)]
pub struct MemoryBodyStore {
    bodies: HashMap<CanonicalUrl, Body>,
}

impl MemoryBodyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a stored body without any digest bookkeeping
    pub fn overwrite(&mut self, url: &CanonicalUrl, body: Body) {
        self.bodies.insert(url.clone(), body);
    }

    pub fn remove(&mut self, url: &CanonicalUrl) -> Option<Body> {
        self.bodies.remove(url)
    }
}

impl BodyStore for MemoryBodyStore {
    fn put(&mut self, url: &CanonicalUrl, body: &Body) -> StorageResult<String> {
        self.bodies.insert(url.clone(), body.clone());
        Ok(body.sha256_hex())
    }

    fn get(&self, url: &CanonicalUrl) -> StorageResult<Option<Body>> {
        Ok(self.bodies.get(url).cloned())
    }

    fn digest(&self, url: &CanonicalUrl) -> StorageResult<Option<String>> {
        Ok(self.bodies.get(url).map(Body::sha256_hex))
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.bodies.len())
    }
}
