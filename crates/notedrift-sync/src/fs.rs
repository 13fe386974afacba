//! File-system backend: a user-chosen directory as the remote store
//!
//! Files are named `<sanitized-title>__<localId>.<md|txt>`; the directory
//! is scanned one level deep, flattening first-level subdirectories.
//! Every operation first verifies the storage root is still readable and
//! writable; a missing grant is reported, never a crash.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use notedrift_core::{BackendKind, IdMapping, Note};

use crate::backend::{Backend, SyncNote};
use crate::config::ProviderConfig;
use crate::result::{BackendError, SyncOutcome, TransportResult};

static ILLEGAL_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).expect("Invalid regex"));

static ID_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__\d+$").expect("Invalid regex"));

/// Storage root for the file-system backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    /// Directory all note files live under
    pub root: PathBuf,
}

/// Transient view of a note file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsNote {
    /// Title parsed from the filename
    pub title: String,
    /// File content; `None` until fetched
    pub content: Option<String>,
    /// File modification time (Unix ms)
    pub modified: i64,
    /// Path of the backing file
    pub location: Option<PathBuf>,
}

impl SyncNote for FsNote {
    fn title(&self) -> &str {
        &self.title
    }

    fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    fn modified(&self) -> i64 {
        self.modified
    }

    fn pinned(&self) -> Option<bool> {
        None
    }

    fn remote_id(&self) -> Option<i64> {
        None
    }

    fn location(&self) -> Option<&str> {
        self.location.as_deref().and_then(Path::to_str)
    }

    fn id_mapping_for(&self, note: &Note) -> IdMapping {
        IdMapping {
            local_note_id: note.id,
            backend: BackendKind::FileSystem,
            remote_id: None,
            etag: None,
            location: self.location().map(ToString::to_string),
            is_deleted_locally: false,
            is_being_updated: false,
        }
    }
}

/// File name for a note: sanitized title, local id marker, extension by
/// the markdown flag
#[must_use]
pub fn filename_for(note: &Note) -> String {
    let ext = if note.is_markdown { "md" } else { "txt" };
    let title = ILLEGAL_FILENAME_CHARS.replace_all(note.title.trim(), "_");
    let title = title.trim();
    if title.is_empty() {
        format!("{}.{ext}", note.id)
    } else {
        format!("{title}__{}.{ext}", note.id)
    }
}

/// Parse `(title, is_markdown)` out of a note filename.
///
/// Returns `None` for extensions this backend does not own. A trailing
/// `__<id>` marker is stripped so imports reproduce the original title.
#[must_use]
pub fn parse_filename(name: &str) -> Option<(String, bool)> {
    let (stem, is_markdown) = name
        .strip_suffix(".md")
        .map(|stem| (stem, true))
        .or_else(|| name.strip_suffix(".txt").map(|stem| (stem, false)))?;
    let title = ID_SUFFIX.replace(stem, "").to_string();
    Some((title, is_markdown))
}

fn mtime_millis(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|mtime| mtime.duration_since(std::time::UNIX_EPOCH).ok())
        .and_then(|duration| i64::try_from(duration.as_millis()).ok())
        .unwrap_or(0)
}

/// Directory-backed sync transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBackend;

impl FsBackend {
    /// Create the backend
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Verify the storage root still grants read and write access.
    async fn check_permissions(config: &FsConfig) -> TransportResult<()> {
        let metadata = tokio::fs::metadata(&config.root).await.map_err(|_| {
            BackendError::PermissionDenied(format!(
                "storage root {} is not accessible",
                config.root.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(BackendError::PermissionDenied(format!(
                "storage root {} is not a directory",
                config.root.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(BackendError::PermissionDenied(format!(
                "storage root {} is not writable",
                config.root.display()
            )));
        }
        Ok(())
    }

    async fn note_from_path(path: PathBuf) -> TransportResult<FsNote> {
        let metadata = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = parse_filename(&name).map_or(name, |(title, _)| title);
        Ok(FsNote {
            title,
            content: None,
            modified: mtime_millis(&metadata),
            location: Some(path),
        })
    }

    fn location_of(note: &FsNote) -> TransportResult<&Path> {
        note.location
            .as_deref()
            .ok_or_else(|| BackendError::InvalidPayload("note file has no location".to_string()))
    }
}

impl Backend for FsBackend {
    type Config = FsConfig;
    type Note = FsNote;

    const KIND: BackendKind = BackendKind::FileSystem;

    fn config_from(config: ProviderConfig) -> Option<Self::Config> {
        match config {
            ProviderConfig::FileSystem(config) => Some(config),
            ProviderConfig::RemoteApi(_) => None,
        }
    }

    async fn list(&self, config: &Self::Config) -> TransportResult<Vec<FsNote>> {
        Self::check_permissions(config).await?;

        let mut notes = Vec::new();
        let mut top = tokio::fs::read_dir(&config.root).await?;
        while let Some(entry) = top.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                // Flatten one level of subdirectories; anything deeper is
                // out of scope for the scan.
                let mut nested = tokio::fs::read_dir(entry.path()).await?;
                while let Some(inner) = nested.next_entry().await? {
                    if inner.file_type().await?.is_file() {
                        notes.push(Self::note_from_path(inner.path()).await?);
                    }
                }
            } else if file_type.is_file() {
                notes.push(Self::note_from_path(entry.path()).await?);
            }
        }
        tracing::debug!(count = notes.len(), root = %config.root.display(), "listed note files");
        Ok(notes)
    }

    async fn create_note(&self, note: &Note, config: &Self::Config) -> TransportResult<FsNote> {
        Self::check_permissions(config).await?;
        let path = config.root.join(filename_for(note));
        tokio::fs::write(&path, &note.content).await?;
        tracing::debug!(path = %path.display(), "created note file");
        Ok(FsNote {
            title: note.title.clone(),
            content: Some(note.content.clone()),
            modified: note.modified,
            location: Some(path),
        })
    }

    async fn note_content(&self, note: &FsNote, config: &Self::Config) -> TransportResult<FsNote> {
        Self::check_permissions(config).await?;
        let path = Self::location_of(note)?;
        let content = tokio::fs::read_to_string(path).await?;
        let metadata = tokio::fs::metadata(path).await?;
        Ok(FsNote {
            content: Some(content),
            modified: mtime_millis(&metadata),
            ..note.clone()
        })
    }

    async fn update_note(&self, note: &FsNote, config: &Self::Config) -> TransportResult<()> {
        Self::check_permissions(config).await?;
        let path = Self::location_of(note)?;
        // write truncates before writing, so stale tails never survive
        tokio::fs::write(path, note.content.as_deref().unwrap_or_default()).await?;
        Ok(())
    }

    async fn delete_note(&self, note: &FsNote, config: &Self::Config) -> TransportResult<()> {
        Self::check_permissions(config).await?;
        let path = Self::location_of(note)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            // Already absent: the intent is satisfied.
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn sync_note_from(&self, note: &Note, mapping: &IdMapping) -> TransportResult<FsNote> {
        Ok(FsNote {
            title: note.title.clone(),
            content: Some(note.content.clone()),
            modified: note.modified,
            location: mapping.location.clone().map(PathBuf::from),
        })
    }

    async fn local_note_from(&self, remote: &FsNote) -> TransportResult<Option<Note>> {
        let Some(name) = remote
            .location
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
        else {
            return Ok(None);
        };
        let Some((title, is_markdown)) = parse_filename(&name) else {
            return Ok(None);
        };
        Ok(Some(Note {
            id: 0,
            title,
            content: remote.content.clone().unwrap_or_default(),
            modified: remote.modified,
            is_pinned: false,
            is_deleted: false,
            is_local_only: false,
            is_markdown,
            notebook_id: None,
        }))
    }

    async fn merge_into_local(&self, local: &Note, remote: &FsNote) -> TransportResult<Note> {
        Ok(Note {
            content: remote.content.clone().unwrap_or_default(),
            modified: remote.modified,
            ..local.clone()
        })
    }

    async fn relocate(
        &self,
        note: &Note,
        remote: &FsNote,
        config: &Self::Config,
    ) -> TransportResult<Option<String>> {
        let current = Self::location_of(remote)?;
        let expected = filename_for(note);
        if current.file_name().and_then(|name| name.to_str()) == Some(expected.as_str()) {
            return Ok(None);
        }
        Self::check_permissions(config).await?;
        let target = config.root.join(&expected);
        tokio::fs::rename(current, &target).await?;
        tracing::debug!(from = %current.display(), to = %target.display(), "renamed note file");
        Ok(target.to_str().map(ToString::to_string))
    }

    async fn authenticate(&self, config: &Self::Config) -> SyncOutcome {
        match Self::check_permissions(config).await {
            Ok(()) => SyncOutcome::Success,
            Err(error) => error.to_outcome(),
        }
    }

    async fn is_server_compatible(&self, _config: &Self::Config) -> SyncOutcome {
        // No version handshake for a directory.
        SyncOutcome::Success
    }
}
