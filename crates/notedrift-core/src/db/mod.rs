//! Database layer for Notedrift

mod connection;
mod mapping_store;
mod migrations;
mod note_store;
mod notebook_store;

pub use connection::Database;
pub use mapping_store::{IdMappingStore, SqliteIdMappingStore};
pub use note_store::{NoteStore, SqliteNoteStore};
pub use notebook_store::{NotebookStore, SqliteNotebookStore};
