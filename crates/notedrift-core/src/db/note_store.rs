//! Note store contract and its `SQLite` implementation

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{BackendKind, IdMapping, Note};

use super::mapping_store::parse_mapping;

/// Trait for local note storage operations consumed by the sync engine.
///
/// The `suppress_sync` flag on write operations keeps the write out of the
/// pending-change queue. Reconciliation always suppresses to avoid a
/// feedback loop where its own writes re-trigger a sync.
pub trait NoteStore: Send + Sync {
    /// Get a note by id
    fn get_by_id(&self, id: i64) -> Result<Option<Note>>;

    /// All notes, including trashed ones
    fn get_all(&self) -> Result<Vec<Note>>;

    /// All notes that are not in the trash
    fn get_non_deleted(&self) -> Result<Vec<Note>>;

    /// Every mapping for the given backend, paired with its local note
    /// (absent when the note row is gone)
    fn get_notes_by_backend(&self, kind: BackendKind) -> Result<Vec<(IdMapping, Option<Note>)>>;

    /// Syncable notes that have no mapping for the given backend yet
    fn get_non_remote_notes(&self, kind: BackendKind) -> Result<Vec<Note>>;

    /// Insert a note and return its assigned id
    fn insert_note(&self, note: &Note, suppress_sync: bool) -> Result<i64>;

    /// Update an existing note
    fn update_note(&self, note: &Note, suppress_sync: bool) -> Result<()>;

    /// Remove a note row entirely
    fn delete_note(&self, id: i64, suppress_sync: bool) -> Result<()>;

    /// Move notes mapped to `kind` whose remote copy disappeared to the
    /// trash, excluding the local ids that were seen in the remote listing
    fn move_remotely_deleted_to_trash(
        &self,
        exclude_local_ids: &[i64],
        kind: BackendKind,
    ) -> Result<()>;
}

/// `SQLite` implementation of `NoteStore`
pub struct SqliteNoteStore {
    conn: Arc<Mutex<Connection>>,
    pending_sync: Mutex<Vec<i64>>,
}

impl SqliteNoteStore {
    /// Create a new store over a shared connection
    #[must_use]
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            pending_sync: Mutex::new(Vec::new()),
        }
    }

    /// Drain the queue of note ids changed by non-suppressed writes.
    ///
    /// The application layer polls this to decide which notes need a
    /// follow-up `update_or_create` push.
    pub fn take_pending_sync(&self) -> Vec<i64> {
        std::mem::take(&mut self.pending_sync.lock().expect("lock poisoned"))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("lock poisoned")
    }

    fn mark_pending(&self, id: i64, suppress_sync: bool) {
        if !suppress_sync {
            self.pending_sync.lock().expect("lock poisoned").push(id);
        }
    }

    pub(super) fn parse_note(row: &Row<'_>) -> rusqlite::Result<Note> {
        Ok(Note {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            modified: row.get(3)?,
            is_pinned: row.get::<_, i32>(4)? != 0,
            is_deleted: row.get::<_, i32>(5)? != 0,
            is_local_only: row.get::<_, i32>(6)? != 0,
            is_markdown: row.get::<_, i32>(7)? != 0,
            notebook_id: row.get(8)?,
        })
    }
}

const NOTE_COLUMNS: &str =
    "id, title, content, modified, is_pinned, is_deleted, is_local_only, is_markdown, notebook_id";

/// Build a `?, ?, ...` placeholder list for an `IN` clause
pub(super) fn placeholders(count: usize) -> String {
    let mut out = String::new();
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

impl NoteStore for SqliteNoteStore {
    fn get_by_id(&self, id: i64) -> Result<Option<Note>> {
        let conn = self.lock();
        let result = conn.query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
            params![id],
            Self::parse_note,
        );

        match result {
            Ok(note) => Ok(Some(note)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_all(&self) -> Result<Vec<Note>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY id"))?;
        let notes = stmt
            .query_map([], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    fn get_non_deleted(&self) -> Result<Vec<Note>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE is_deleted = 0 ORDER BY id"
        ))?;
        let notes = stmt
            .query_map([], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    fn get_notes_by_backend(&self, kind: BackendKind) -> Result<Vec<(IdMapping, Option<Note>)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT m.local_note_id, m.backend, m.remote_id, m.etag, m.location,
                    m.is_deleted_locally, m.is_being_updated,
                    n.id, n.title, n.content, n.modified, n.is_pinned, n.is_deleted,
                    n.is_local_only, n.is_markdown, n.notebook_id
             FROM id_mappings m
             LEFT JOIN notes n ON n.id = m.local_note_id
             WHERE m.backend = ?",
        )?;

        let rows = stmt
            .query_map(params![kind.as_str()], |row| {
                let mapping = parse_mapping(row)?;
                let note = match row.get::<_, Option<i64>>(7)? {
                    None => None,
                    Some(id) => Some(Note {
                        id,
                        title: row.get(8)?,
                        content: row.get(9)?,
                        modified: row.get(10)?,
                        is_pinned: row.get::<_, i32>(11)? != 0,
                        is_deleted: row.get::<_, i32>(12)? != 0,
                        is_local_only: row.get::<_, i32>(13)? != 0,
                        is_markdown: row.get::<_, i32>(14)? != 0,
                        notebook_id: row.get(15)?,
                    }),
                };
                Ok((mapping, note))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    fn get_non_remote_notes(&self, kind: BackendKind) -> Result<Vec<Note>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE is_deleted = 0 AND is_local_only = 0
               AND id NOT IN (SELECT local_note_id FROM id_mappings WHERE backend = ?)
             ORDER BY id"
        ))?;
        let notes = stmt
            .query_map(params![kind.as_str()], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    fn insert_note(&self, note: &Note, suppress_sync: bool) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO notes (title, content, modified, is_pinned, is_deleted,
                                is_local_only, is_markdown, notebook_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                note.title,
                note.content,
                note.modified,
                i32::from(note.is_pinned),
                i32::from(note.is_deleted),
                i32::from(note.is_local_only),
                i32::from(note.is_markdown),
                note.notebook_id,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);
        self.mark_pending(id, suppress_sync);
        Ok(id)
    }

    fn update_note(&self, note: &Note, suppress_sync: bool) -> Result<()> {
        let conn = self.lock();
        let rows = conn.execute(
            "UPDATE notes SET title = ?, content = ?, modified = ?, is_pinned = ?,
                              is_deleted = ?, is_local_only = ?, is_markdown = ?, notebook_id = ?
             WHERE id = ?",
            params![
                note.title,
                note.content,
                note.modified,
                i32::from(note.is_pinned),
                i32::from(note.is_deleted),
                i32::from(note.is_local_only),
                i32::from(note.is_markdown),
                note.notebook_id,
                note.id,
            ],
        )?;
        drop(conn);

        if rows == 0 {
            return Err(Error::NotFound(note.id));
        }
        self.mark_pending(note.id, suppress_sync);
        Ok(())
    }

    fn delete_note(&self, id: i64, suppress_sync: bool) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM notes WHERE id = ?", params![id])?;
        drop(conn);
        self.mark_pending(id, suppress_sync);
        Ok(())
    }

    fn move_remotely_deleted_to_trash(
        &self,
        exclude_local_ids: &[i64],
        kind: BackendKind,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.lock();
        let sql = format!(
            "UPDATE notes SET is_deleted = 1, modified = ?
             WHERE is_deleted = 0
               AND id IN (SELECT local_note_id FROM id_mappings
                          WHERE backend = ? AND is_deleted_locally = 0)
               AND id NOT IN ({})",
            placeholders(exclude_local_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let kind_str = kind.as_str();
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&now, &kind_str];
        for id in exclude_local_ids {
            values.push(id);
        }
        stmt.execute(values.as_slice())?;
        Ok(())
    }
}
