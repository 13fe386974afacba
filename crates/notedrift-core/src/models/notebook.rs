//! Notebook model

use serde::{Deserialize, Serialize};

/// A named group of notes.
///
/// Remote backends expose notebooks as a flat category string; lookups by
/// name are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    /// Store-assigned identifier (0 = not yet persisted)
    pub id: i64,
    /// Notebook name
    pub name: String,
}

impl Notebook {
    /// Create a new notebook with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
        }
    }
}
