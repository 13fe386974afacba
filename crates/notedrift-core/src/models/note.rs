//! Note model

use serde::{Deserialize, Serialize};

/// A note in the local store.
///
/// Ids are assigned by the store on insert; a freshly built note carries
/// id 0 until it has been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identifier (0 = not yet persisted)
    pub id: i64,
    /// Note title
    pub title: String,
    /// Body content
    pub content: String,
    /// Last modification timestamp (Unix ms), non-decreasing per note
    pub modified: i64,
    /// Pinned/favorite flag
    pub is_pinned: bool,
    /// Soft delete flag (note lives in the trash)
    pub is_deleted: bool,
    /// Local-only notes are excluded from all sync
    pub is_local_only: bool,
    /// Whether the note body is Markdown (affects file extension on disk)
    pub is_markdown: bool,
    /// Owning notebook, if any
    pub notebook_id: Option<i64>,
}

impl Note {
    /// Create a new note with the given title and content
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            content: content.into(),
            modified: chrono::Utc::now().timestamp_millis(),
            is_pinned: false,
            is_deleted: false,
            is_local_only: false,
            is_markdown: true,
            notebook_id: None,
        }
    }

    /// Whether this note takes part in synchronization at all
    #[must_use]
    pub const fn is_syncable(&self) -> bool {
        !self.is_local_only && !self.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_new() {
        let note = Note::new("Title", "Body");
        assert_eq!(note.id, 0);
        assert_eq!(note.title, "Title");
        assert_eq!(note.content, "Body");
        assert!(note.modified > 0);
        assert!(note.is_markdown);
        assert!(!note.is_deleted);
    }

    #[test]
    fn test_is_syncable() {
        let note = Note::new("a", "b");
        assert!(note.is_syncable());

        let local_only = Note {
            is_local_only: true,
            ..Note::new("a", "b")
        };
        assert!(!local_only.is_syncable());

        let deleted = Note {
            is_deleted: true,
            ..Note::new("a", "b")
        };
        assert!(!deleted.is_syncable());
    }
}
