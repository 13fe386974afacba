//! notedrift-core - Core library for Notedrift
//!
//! This crate contains the shared models, the local note store contracts,
//! and their `SQLite` implementations used by the sync engine.

pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{BackendKind, IdMapping, Note, Notebook};
