//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS notebooks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            modified INTEGER NOT NULL,
            is_pinned INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_local_only INTEGER NOT NULL DEFAULT 0,
            is_markdown INTEGER NOT NULL DEFAULT 1,
            notebook_id INTEGER REFERENCES notebooks(id) ON DELETE SET NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notes_modified ON notes(modified DESC);
        CREATE INDEX IF NOT EXISTS idx_notes_deleted ON notes(is_deleted);
        CREATE TABLE IF NOT EXISTS id_mappings (
            local_note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
            backend TEXT NOT NULL,
            remote_id INTEGER,
            etag TEXT,
            location TEXT,
            is_deleted_locally INTEGER NOT NULL DEFAULT 0,
            is_being_updated INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (local_note_id, backend)
        );
        CREATE INDEX IF NOT EXISTS idx_id_mappings_backend ON id_mappings(backend);
        CREATE INDEX IF NOT EXISTS idx_id_mappings_remote ON id_mappings(backend, remote_id);
        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )?;

    Ok(())
}
