//! Notebook store contract and its `SQLite` implementation

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::Notebook;

/// Trait for notebook lookups used when mapping remote categories.
pub trait NotebookStore: Send + Sync {
    /// Get a notebook by id
    fn get_by_id(&self, id: i64) -> Result<Option<Notebook>>;

    /// Case-sensitive lookup by name
    fn get_by_name(&self, name: &str) -> Result<Option<Notebook>>;

    /// Insert a notebook and return its assigned id
    fn insert(&self, notebook: &Notebook) -> Result<i64>;
}

/// `SQLite` implementation of `NotebookStore`
pub struct SqliteNotebookStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNotebookStore {
    /// Create a new store over a shared connection
    #[must_use]
    pub const fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("lock poisoned")
    }

    fn query_one(&self, sql: &str, value: &dyn rusqlite::ToSql) -> Result<Option<Notebook>> {
        let conn = self.lock();
        let result = conn.query_row(sql, [value], |row| {
            Ok(Notebook {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        });
        match result {
            Ok(notebook) => Ok(Some(notebook)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl NotebookStore for SqliteNotebookStore {
    fn get_by_id(&self, id: i64) -> Result<Option<Notebook>> {
        self.query_one("SELECT id, name FROM notebooks WHERE id = ?", &id)
    }

    fn get_by_name(&self, name: &str) -> Result<Option<Notebook>> {
        self.query_one("SELECT id, name FROM notebooks WHERE name = ?", &name)
    }

    fn insert(&self, notebook: &Notebook) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO notebooks (name) VALUES (?)",
            params![notebook.name],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_insert_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        let store = db.notebook_store();

        let id = store.insert(&Notebook::new("Work")).unwrap();
        assert_eq!(store.get_by_id(id).unwrap().unwrap().name, "Work");
        assert_eq!(store.get_by_name("Work").unwrap().unwrap().id, id);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let db = Database::open_in_memory().unwrap();
        let store = db.notebook_store();

        store.insert(&Notebook::new("Work")).unwrap();
        assert!(store.get_by_name("work").unwrap().is_none());
    }
}
