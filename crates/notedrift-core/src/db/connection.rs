//! Database connection management

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::error::Result;

use super::migrations;
use super::{SqliteIdMappingStore, SqliteNoteStore, SqliteNotebookStore};

/// Wrapper around one `SQLite` connection shared by all stores.
///
/// The connection is guarded by a mutex so the store handles are usable
/// from the sync engine's worker task.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Note store handle backed by this database
    #[must_use]
    pub fn note_store(&self) -> SqliteNoteStore {
        SqliteNoteStore::new(Arc::clone(&self.conn))
    }

    /// Notebook store handle backed by this database
    #[must_use]
    pub fn notebook_store(&self) -> SqliteNotebookStore {
        SqliteNotebookStore::new(Arc::clone(&self.conn))
    }

    /// Id-mapping store handle backed by this database
    #[must_use]
    pub fn mapping_store(&self) -> SqliteIdMappingStore {
        SqliteIdMappingStore::new(Arc::clone(&self.conn))
    }
}
