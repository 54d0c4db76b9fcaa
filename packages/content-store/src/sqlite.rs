//! SQLite-backed blob store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{BlobStore, ContentHash, Error, Result};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS blobs (
    hash TEXT PRIMARY KEY,
    data BLOB NOT NULL
)";

/// How long a writer waits on a database locked by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A durable blob store in a single SQLite table.
///
/// Deduplication is delegated to the primary key: writes use
/// `INSERT OR IGNORE`, so a race between two identical puts leaves exactly one
/// row. The connection sits behind a mutex; SQLite serializes the writes.
///
/// Open the store once at startup and share it (`Arc<SqliteBlobStore>` or
/// `Arc<dyn BlobStore>`). Call [`close`](SqliteBlobStore::close) at shutdown
/// to surface errors that a plain drop would swallow.
#[derive(Debug)]
pub struct SqliteBlobStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteBlobStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::persistence("open", e))?;
        let store = Self::init(conn, Some(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "opened blob store");
        Ok(store)
    }

    /// Open a store that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::persistence("open", e))?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::persistence("open", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::persistence("create_schema", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// The database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the underlying connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| Error::persistence("close", e.to_string()))?;
        conn.close()
            .map_err(|(_, e)| Error::persistence("close", e))
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::persistence(operation, e.to_string()))
    }
}

impl BlobStore for SqliteBlobStore {
    fn put(&self, data: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::of(data);
        let conn = self.lock("put")?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO blobs (hash, data) VALUES (?1, ?2)",
                params![hash.as_str(), data],
            )
            .map_err(|e| Error::persistence("put", e))?;
        if inserted == 0 {
            tracing::debug!(%hash, "blob already stored");
        } else {
            tracing::debug!(%hash, size = data.len(), "stored blob");
        }
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        let conn = self.lock("get")?;
        let data: Option<Vec<u8>> = conn
            .query_row(
                "SELECT data FROM blobs WHERE hash = ?1",
                params![hash.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::persistence("get", e))?;
        Ok(data.map(Bytes::from))
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        let conn = self.lock("contains")?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM blobs WHERE hash = ?1",
                params![hash.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::persistence("contains", e))?;
        Ok(found.is_some())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.lock("len")?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))
            .map_err(|e| Error::persistence("len", e))?;
        Ok(count as usize)
    }
}
