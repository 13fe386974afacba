//! Id mapping between local notes and their remote representations

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One concrete sync transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Notes-over-HTTP service
    RemoteApi,
    /// User-chosen directory on the file system
    FileSystem,
}

impl BackendKind {
    /// Stable string form used in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteApi => "remote_api",
            Self::FileSystem => "file_system",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote_api" => Ok(Self::RemoteApi),
            "file_system" => Ok(Self::FileSystem),
            other => Err(format!("unknown backend kind: {other}")),
        }
    }
}

/// Stored correspondence between a local note and its copy on one backend.
///
/// At most one mapping exists per (`local_note_id`, `backend`) pair.
/// A note with `is_local_only` set must never acquire a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    /// Local note this mapping belongs to
    pub local_note_id: i64,
    /// Which backend the remote copy lives on
    pub backend: BackendKind,
    /// Server-assigned id (remote-API backend only)
    pub remote_id: Option<i64>,
    /// Entity tag from the last sync, for optimistic concurrency
    pub etag: Option<String>,
    /// Storage location (file-system backend only)
    pub location: Option<String>,
    /// The local copy was deleted; the remote copy should follow
    pub is_deleted_locally: bool,
    /// An update is in flight; reconciliation skips this mapping
    pub is_being_updated: bool,
}

impl IdMapping {
    /// Whether this mapping refers to the given remote identity.
    ///
    /// The remote-API backend identifies notes by server id, the
    /// file-system backend by location; whichever side is present wins.
    #[must_use]
    pub fn matches(&self, remote_id: Option<i64>, location: Option<&str>) -> bool {
        match (self.remote_id, remote_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => match (self.location.as_deref(), location) {
                (Some(ours), Some(theirs)) => ours == theirs,
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_round_trip() {
        for kind in [BackendKind::RemoteApi, BackendKind::FileSystem] {
            let parsed: BackendKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("dropbox".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_matches_prefers_remote_id() {
        let mapping = IdMapping {
            local_note_id: 1,
            backend: BackendKind::RemoteApi,
            remote_id: Some(9),
            etag: None,
            location: None,
            is_deleted_locally: false,
            is_being_updated: false,
        };
        assert!(mapping.matches(Some(9), None));
        assert!(!mapping.matches(Some(8), None));
        assert!(!mapping.matches(None, Some("/tmp/a.md")));
    }

    #[test]
    fn test_matches_by_location() {
        let mapping = IdMapping {
            local_note_id: 1,
            backend: BackendKind::FileSystem,
            remote_id: None,
            etag: None,
            location: Some("/notes/a__1.md".to_string()),
            is_deleted_locally: false,
            is_being_updated: false,
        };
        assert!(mapping.matches(None, Some("/notes/a__1.md")));
        assert!(!mapping.matches(None, Some("/notes/b__2.md")));
    }
}
