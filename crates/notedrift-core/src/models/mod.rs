//! Data models

mod id_mapping;
mod note;
mod notebook;

pub use id_mapping::{BackendKind, IdMapping};
pub use note::Note;
pub use notebook::Notebook;
