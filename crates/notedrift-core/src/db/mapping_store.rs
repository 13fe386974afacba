//! Id-mapping store contract and its `SQLite` implementation

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{BackendKind, IdMapping};

use super::note_store::placeholders;

/// Trait for id-mapping bookkeeping consumed by the sync engine.
pub trait IdMappingStore: Send + Sync {
    /// Mapping for one note on one backend, if any
    fn get_by_local_id_and_backend(
        &self,
        local_id: i64,
        kind: BackendKind,
    ) -> Result<Option<IdMapping>>;

    /// Mapping carrying the given server-assigned id
    fn get_by_remote_id(&self, remote_id: i64, kind: BackendKind) -> Result<Option<IdMapping>>;

    /// Every mapping for the given backend
    fn get_all_by_backend(&self, kind: BackendKind) -> Result<Vec<IdMapping>>;

    /// Insert a new mapping; fails if one already exists for the pair
    fn insert(&self, mapping: &IdMapping) -> Result<()>;

    /// Update an existing mapping in place
    fn update(&self, mapping: &IdMapping) -> Result<()>;

    /// Remove the given mappings
    fn delete_many(&self, mappings: &[IdMapping]) -> Result<()>;

    /// Insert-or-replace keyed by (local note id, backend)
    fn assign_backend_to_note(&self, mapping: &IdMapping) -> Result<()>;

    /// Drop mappings for `kind` whose remote copy disappeared, excluding
    /// the local ids seen in the remote listing
    fn unassign_backend_from_remotely_deleted(
        &self,
        exclude_local_ids: &[i64],
        kind: BackendKind,
    ) -> Result<()>;
}

/// Parse an `IdMapping` from the first seven columns of a row
pub(super) fn parse_mapping(row: &Row<'_>) -> rusqlite::Result<IdMapping> {
    let backend: String = row.get(1)?;
    let backend = backend.parse::<BackendKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(IdMapping {
        local_note_id: row.get(0)?,
        backend,
        remote_id: row.get(2)?,
        etag: row.get(3)?,
        location: row.get(4)?,
        is_deleted_locally: row.get::<_, i32>(5)? != 0,
        is_being_updated: row.get::<_, i32>(6)? != 0,
    })
}

const MAPPING_COLUMNS: &str =
    "local_note_id, backend, remote_id, etag, location, is_deleted_locally, is_being_updated";

/// `SQLite` implementation of `IdMappingStore`
pub struct SqliteIdMappingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIdMappingStore {
    /// Create a new store over a shared connection
    #[must_use]
    pub const fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("lock poisoned")
    }

    /// Local-only notes must never acquire a mapping.
    fn check_not_local_only(conn: &Connection, local_id: i64) -> Result<()> {
        let local_only: Option<bool> = conn
            .query_row(
                "SELECT is_local_only FROM notes WHERE id = ?",
                params![local_id],
                |row| row.get::<_, i32>(0).map(|v| v != 0),
            )
            .ok();
        if local_only == Some(true) {
            return Err(Error::InvalidInput(format!(
                "note {local_id} is local-only and cannot be mapped"
            )));
        }
        Ok(())
    }
}

impl IdMappingStore for SqliteIdMappingStore {
    fn get_by_local_id_and_backend(
        &self,
        local_id: i64,
        kind: BackendKind,
    ) -> Result<Option<IdMapping>> {
        let conn = self.lock();
        let result = conn.query_row(
            &format!(
                "SELECT {MAPPING_COLUMNS} FROM id_mappings WHERE local_note_id = ? AND backend = ?"
            ),
            params![local_id, kind.as_str()],
            parse_mapping,
        );
        match result {
            Ok(mapping) => Ok(Some(mapping)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_by_remote_id(&self, remote_id: i64, kind: BackendKind) -> Result<Option<IdMapping>> {
        let conn = self.lock();
        let result = conn.query_row(
            &format!(
                "SELECT {MAPPING_COLUMNS} FROM id_mappings WHERE remote_id = ? AND backend = ?"
            ),
            params![remote_id, kind.as_str()],
            parse_mapping,
        );
        match result {
            Ok(mapping) => Ok(Some(mapping)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_all_by_backend(&self, kind: BackendKind) -> Result<Vec<IdMapping>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MAPPING_COLUMNS} FROM id_mappings WHERE backend = ? ORDER BY local_note_id"
        ))?;
        let mappings = stmt
            .query_map(params![kind.as_str()], parse_mapping)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(mappings)
    }

    fn insert(&self, mapping: &IdMapping) -> Result<()> {
        let conn = self.lock();
        Self::check_not_local_only(&conn, mapping.local_note_id)?;
        conn.execute(
            "INSERT INTO id_mappings (local_note_id, backend, remote_id, etag, location,
                                      is_deleted_locally, is_being_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                mapping.local_note_id,
                mapping.backend.as_str(),
                mapping.remote_id,
                mapping.etag,
                mapping.location,
                i32::from(mapping.is_deleted_locally),
                i32::from(mapping.is_being_updated),
            ],
        )?;
        Ok(())
    }

    fn update(&self, mapping: &IdMapping) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE id_mappings SET remote_id = ?, etag = ?, location = ?,
                                    is_deleted_locally = ?, is_being_updated = ?
             WHERE local_note_id = ? AND backend = ?",
            params![
                mapping.remote_id,
                mapping.etag,
                mapping.location,
                i32::from(mapping.is_deleted_locally),
                i32::from(mapping.is_being_updated),
                mapping.local_note_id,
                mapping.backend.as_str(),
            ],
        )?;
        Ok(())
    }

    fn delete_many(&self, mappings: &[IdMapping]) -> Result<()> {
        let conn = self.lock();
        for mapping in mappings {
            conn.execute(
                "DELETE FROM id_mappings WHERE local_note_id = ? AND backend = ?",
                params![mapping.local_note_id, mapping.backend.as_str()],
            )?;
        }
        Ok(())
    }

    fn assign_backend_to_note(&self, mapping: &IdMapping) -> Result<()> {
        let conn = self.lock();
        Self::check_not_local_only(&conn, mapping.local_note_id)?;
        conn.execute(
            "INSERT OR REPLACE INTO id_mappings
                 (local_note_id, backend, remote_id, etag, location,
                  is_deleted_locally, is_being_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                mapping.local_note_id,
                mapping.backend.as_str(),
                mapping.remote_id,
                mapping.etag,
                mapping.location,
                i32::from(mapping.is_deleted_locally),
                i32::from(mapping.is_being_updated),
            ],
        )?;
        Ok(())
    }

    fn unassign_backend_from_remotely_deleted(
        &self,
        exclude_local_ids: &[i64],
        kind: BackendKind,
    ) -> Result<()> {
        let conn = self.lock();
        let sql = format!(
            "DELETE FROM id_mappings
             WHERE backend = ? AND is_deleted_locally = 0
               AND local_note_id NOT IN ({})",
            placeholders(exclude_local_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let kind_str = kind.as_str();
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&kind_str];
        for id in exclude_local_ids {
            values.push(id);
        }
        stmt.execute(values.as_slice())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NoteStore};
    use crate::models::Note;
    use pretty_assertions::assert_eq;

    fn mapping(local: i64, remote: i64) -> IdMapping {
        IdMapping {
            local_note_id: local,
            backend: BackendKind::RemoteApi,
            remote_id: Some(remote),
            etag: Some("etag-1".to_string()),
            location: None,
            is_deleted_locally: false,
            is_being_updated: false,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        let notes = db.note_store();
        let store = db.mapping_store();

        let id = notes.insert_note(&Note::new("a", "b"), true).unwrap();
        store.insert(&mapping(id, 9)).unwrap();

        let by_local = store
            .get_by_local_id_and_backend(id, BackendKind::RemoteApi)
            .unwrap()
            .unwrap();
        assert_eq!(by_local.remote_id, Some(9));

        let by_remote = store
            .get_by_remote_id(9, BackendKind::RemoteApi)
            .unwrap()
            .unwrap();
        assert_eq!(by_remote.local_note_id, id);

        assert!(store
            .get_by_local_id_and_backend(id, BackendKind::FileSystem)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_one_mapping_per_note_and_backend() {
        let db = Database::open_in_memory().unwrap();
        let notes = db.note_store();
        let store = db.mapping_store();

        let id = notes.insert_note(&Note::new("a", "b"), true).unwrap();
        store.insert(&mapping(id, 9)).unwrap();
        assert!(store.insert(&mapping(id, 10)).is_err());

        // assign replaces instead
        store.assign_backend_to_note(&mapping(id, 10)).unwrap();
        let stored = store
            .get_by_local_id_and_backend(id, BackendKind::RemoteApi)
            .unwrap()
            .unwrap();
        assert_eq!(stored.remote_id, Some(10));
    }

    #[test]
    fn test_local_only_notes_cannot_be_mapped() {
        let db = Database::open_in_memory().unwrap();
        let notes = db.note_store();
        let store = db.mapping_store();

        let note = Note {
            is_local_only: true,
            ..Note::new("private", "")
        };
        let id = notes.insert_note(&note, true).unwrap();
        assert!(store.insert(&mapping(id, 9)).is_err());
        assert!(store.assign_backend_to_note(&mapping(id, 9)).is_err());
    }

    #[test]
    fn test_unassign_skips_deleted_locally() {
        let db = Database::open_in_memory().unwrap();
        let notes = db.note_store();
        let store = db.mapping_store();

        let a = notes.insert_note(&Note::new("a", ""), true).unwrap();
        let b = notes.insert_note(&Note::new("b", ""), true).unwrap();
        store.insert(&mapping(a, 1)).unwrap();
        store
            .insert(&IdMapping {
                is_deleted_locally: true,
                ..mapping(b, 2)
            })
            .unwrap();

        store
            .unassign_backend_from_remotely_deleted(&[], BackendKind::RemoteApi)
            .unwrap();

        assert!(store
            .get_by_local_id_and_backend(a, BackendKind::RemoteApi)
            .unwrap()
            .is_none());
        // Pending local delete intent survives the sweep.
        assert!(store
            .get_by_local_id_and_backend(b, BackendKind::RemoteApi)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_delete_many() {
        let db = Database::open_in_memory().unwrap();
        let notes = db.note_store();
        let store = db.mapping_store();

        let a = notes.insert_note(&Note::new("a", ""), true).unwrap();
        let b = notes.insert_note(&Note::new("b", ""), true).unwrap();
        let first = mapping(a, 1);
        let second = mapping(b, 2);
        store.insert(&first).unwrap();
        store.insert(&second).unwrap();

        store.delete_many(&[first, second]).unwrap();
        assert!(store.get_all_by_backend(BackendKind::RemoteApi).unwrap().is_empty());
    }
}
