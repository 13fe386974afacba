//! Remote-API backend: notes over HTTP
//!
//! Wire contract: `GET /api/v1/notes` lists, `POST` creates (the server
//! assigns id and entity tag), `PUT /notes/{id}` updates conditionally via
//! `If-Match`, `DELETE /notes/{id}` removes, and `GET /api/v1/capabilities`
//! advertises supported API versions.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use notedrift_core::db::NotebookStore;
use notedrift_core::{BackendKind, IdMapping, Note, Notebook};

use crate::backend::{Backend, SyncNote};
use crate::config::ProviderConfig;
use crate::result::{BackendError, SyncOutcome, TransportResult};

const NOTES_PATH: &str = "api/v1/notes";
const CAPABILITIES_PATH: &str = "api/v1/capabilities";

/// Oldest API major version this client can talk to
pub const MIN_SUPPORTED_API_VERSION: u32 = 1;

/// Connection parameters for the remote-API backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Server address, e.g. `https://notes.example.com`
    pub base_url: String,
    /// Basic-auth user
    pub username: String,
    /// Basic-auth password or app token
    pub password: String,
}

impl ApiConfig {
    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Wire representation of a note on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNote {
    /// Server-assigned id (0 = not yet created)
    pub id: i64,
    /// Entity tag for optimistic concurrency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Note title
    pub title: String,
    /// Markdown body
    #[serde(default)]
    pub content: Option<String>,
    /// Notebook name; empty string = none
    #[serde(default)]
    pub category: String,
    /// Favorite flag, mapped to the local pinned flag
    #[serde(default)]
    pub favorite: bool,
    /// Modification timestamp (Unix ms)
    pub modified: i64,
    /// Server-side read-only marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

impl SyncNote for ApiNote {
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
        Some(self.favorite)
    }

    fn remote_id(&self) -> Option<i64> {
        (self.id != 0).then_some(self.id)
    }

    fn location(&self) -> Option<&str> {
        None
    }

    fn id_mapping_for(&self, note: &Note) -> IdMapping {
        IdMapping {
            local_note_id: note.id,
            backend: BackendKind::RemoteApi,
            remote_id: Some(self.id),
            etag: self.etag.clone(),
            location: None,
            is_deleted_locally: false,
            is_being_updated: false,
        }
    }
}

/// Capabilities document served by the remote API.
#[derive(Debug, Clone, Deserialize)]
pub struct Capabilities {
    /// Supported API versions, e.g. `["0.2", "1.3"]`
    pub api_versions: Vec<String>,
}

/// Parse a capabilities payload.
///
/// Public for testability without network access.
pub fn parse_capabilities(payload: &str) -> TransportResult<Capabilities> {
    serde_json::from_str(payload)
        .map_err(|error| BackendError::InvalidPayload(format!("capabilities document: {error}")))
}

/// Highest major version advertised in a capabilities document
#[must_use]
pub fn max_api_major(capabilities: &Capabilities) -> Option<u32> {
    capabilities
        .api_versions
        .iter()
        .filter_map(|version| {
            version
                .split('.')
                .next()
                .and_then(|major| major.parse::<u32>().ok())
        })
        .max()
}

/// Notes-over-HTTP backend.
pub struct ApiBackend {
    client: reqwest::Client,
    notebooks: Arc<dyn NotebookStore>,
}

impl ApiBackend {
    /// Create a backend with its own HTTP client
    pub fn new(notebooks: Arc<dyn NotebookStore>) -> TransportResult<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            notebooks,
        })
    }

    async fn check_status(response: reqwest::Response) -> TransportResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::PRECONDITION_FAILED {
            return Err(BackendError::Conflict);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            code: status.as_u16(),
            message: if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            },
        })
    }

    /// Category string for a local note (notebook name, or empty)
    fn category_for(&self, note: &Note) -> TransportResult<String> {
        let Some(notebook_id) = note.notebook_id else {
            return Ok(String::new());
        };
        let notebook = self
            .notebooks
            .get_by_id(notebook_id)
            .map_err(|error| BackendError::Store(error.to_string()))?;
        Ok(notebook.map(|n| n.name).unwrap_or_default())
    }

    /// Resolve a category to a notebook id, creating the notebook when
    /// absent. Lookup is case-sensitive; a blank category means none.
    fn notebook_id_for_category(&self, category: &str) -> TransportResult<Option<i64>> {
        if category.trim().is_empty() {
            return Ok(None);
        }
        let existing = self
            .notebooks
            .get_by_name(category)
            .map_err(|error| BackendError::Store(error.to_string()))?;
        if let Some(notebook) = existing {
            return Ok(Some(notebook.id));
        }
        let id = self
            .notebooks
            .insert(&Notebook::new(category))
            .map_err(|error| BackendError::Store(error.to_string()))?;
        Ok(Some(id))
    }

    fn wire_note(&self, note: &Note, remote_id: i64, etag: Option<String>) -> TransportResult<ApiNote> {
        Ok(ApiNote {
            id: remote_id,
            etag,
            title: note.title.clone(),
            content: Some(note.content.clone()),
            category: self.category_for(note)?,
            favorite: note.is_pinned,
            modified: note.modified,
            read_only: None,
        })
    }
}

impl Backend for ApiBackend {
    type Config = ApiConfig;
    type Note = ApiNote;

    const KIND: BackendKind = BackendKind::RemoteApi;

    fn config_from(config: ProviderConfig) -> Option<Self::Config> {
        match config {
            ProviderConfig::RemoteApi(config) => Some(config),
            ProviderConfig::FileSystem(_) => None,
        }
    }

    async fn list(&self, config: &Self::Config) -> TransportResult<Vec<ApiNote>> {
        let response = self
            .client
            .get(config.url(NOTES_PATH))
            .basic_auth(&config.username, Some(&config.password))
            .send()
            .await?;
        let notes = Self::check_status(response).await?.json().await?;
        Ok(notes)
    }

    async fn create_note(&self, note: &Note, config: &Self::Config) -> TransportResult<ApiNote> {
        let body = self.wire_note(note, 0, None)?;
        let response = self
            .client
            .post(config.url(NOTES_PATH))
            .basic_auth(&config.username, Some(&config.password))
            .json(&body)
            .send()
            .await?;
        let created = Self::check_status(response).await?.json().await?;
        Ok(created)
    }

    async fn note_content(&self, note: &ApiNote, config: &Self::Config) -> TransportResult<ApiNote> {
        let response = self
            .client
            .get(config.url(&format!("{NOTES_PATH}/{}", note.id)))
            .basic_auth(&config.username, Some(&config.password))
            .send()
            .await?;
        let full = Self::check_status(response).await?.json().await?;
        Ok(full)
    }

    async fn update_note(&self, note: &ApiNote, config: &Self::Config) -> TransportResult<()> {
        let etag = note.etag.clone().unwrap_or_default();
        let response = self
            .client
            .put(config.url(&format!("{NOTES_PATH}/{}", note.id)))
            .basic_auth(&config.username, Some(&config.password))
            .header("If-Match", format!("\"{etag}\""))
            .json(note)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn delete_note(&self, note: &ApiNote, config: &Self::Config) -> TransportResult<()> {
        let response = self
            .client
            .delete(config.url(&format!("{NOTES_PATH}/{}", note.id)))
            .basic_auth(&config.username, Some(&config.password))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn sync_note_from(&self, note: &Note, mapping: &IdMapping) -> TransportResult<ApiNote> {
        self.wire_note(note, mapping.remote_id.unwrap_or(0), mapping.etag.clone())
    }

    async fn local_note_from(&self, remote: &ApiNote) -> TransportResult<Option<Note>> {
        let notebook_id = self.notebook_id_for_category(&remote.category)?;
        Ok(Some(Note {
            id: 0,
            title: remote.title.clone(),
            content: remote.content.clone().unwrap_or_default(),
            modified: remote.modified,
            is_pinned: remote.favorite,
            is_deleted: false,
            is_local_only: false,
            is_markdown: true,
            notebook_id,
        }))
    }

    async fn merge_into_local(&self, local: &Note, remote: &ApiNote) -> TransportResult<Note> {
        let notebook_id = self.notebook_id_for_category(&remote.category)?;
        Ok(Note {
            title: remote.title.clone(),
            content: remote.content.clone().unwrap_or_default(),
            modified: remote.modified,
            is_pinned: remote.favorite,
            notebook_id,
            ..local.clone()
        })
    }

    async fn relocate(
        &self,
        _note: &Note,
        _remote: &ApiNote,
        _config: &Self::Config,
    ) -> TransportResult<Option<String>> {
        Ok(None)
    }

    async fn authenticate(&self, config: &Self::Config) -> SyncOutcome {
        // Harmless read-only call; any failure detail stays here.
        match self.list(config).await {
            Ok(_) => SyncOutcome::Success,
            Err(error) => {
                tracing::debug!(%error, "authentication probe failed");
                SyncOutcome::InvalidConfig
            }
        }
    }

    async fn is_server_compatible(&self, config: &Self::Config) -> SyncOutcome {
        let result: TransportResult<()> = async {
            let response = self
                .client
                .get(config.url(CAPABILITIES_PATH))
                .basic_auth(&config.username, Some(&config.password))
                .send()
                .await?;
            let payload = Self::check_status(response).await?.text().await?;
            let capabilities = parse_capabilities(&payload)?;
            let max_major = max_api_major(&capabilities).ok_or(BackendError::Incompatible)?;
            if max_major < MIN_SUPPORTED_API_VERSION {
                return Err(BackendError::Incompatible);
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => SyncOutcome::Success,
            Err(error) => {
                tracing::debug!(%error, "compatibility probe failed");
                SyncOutcome::ServerNotSupported
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notedrift_core::db::Database;
    use pretty_assertions::assert_eq;

    fn backend() -> ApiBackend {
        let db = Database::open_in_memory().unwrap();
        ApiBackend::new(Arc::new(db.notebook_store())).unwrap()
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = ApiConfig {
            base_url: "https://notes.example.com".to_string(),
            username: "user".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ApiConfig {
            base_url: "https://notes.example.com/".to_string(),
            username: String::new(),
            password: String::new(),
        };
        assert_eq!(
            config.url(NOTES_PATH),
            "https://notes.example.com/api/v1/notes"
        );
    }

    #[test]
    fn test_wire_note_round_trip() {
        let payload = r#"{
            "id": 9,
            "etag": "abc",
            "title": "Groceries",
            "content": "- milk",
            "category": "Home",
            "favorite": true,
            "modified": 1200,
            "readOnly": false
        }"#;
        let note: ApiNote = serde_json::from_str(payload).unwrap();
        assert_eq!(note.id, 9);
        assert_eq!(note.etag.as_deref(), Some("abc"));
        assert_eq!(note.read_only, Some(false));

        let serialized = serde_json::to_string(&note).unwrap();
        let back: ApiNote = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn test_parse_capabilities() {
        let capabilities = parse_capabilities(r#"{"api_versions": ["0.2", "1.3"]}"#).unwrap();
        assert_eq!(max_api_major(&capabilities), Some(1));

        assert!(parse_capabilities("not json").is_err());
    }

    #[test]
    fn test_max_api_major_ignores_garbage_versions() {
        let capabilities = Capabilities {
            api_versions: vec!["x.y".to_string(), "2.0".to_string()],
        };
        assert_eq!(max_api_major(&capabilities), Some(2));
    }

    #[tokio::test]
    async fn test_local_note_from_creates_notebook() {
        let db = Database::open_in_memory().unwrap();
        let notebooks = Arc::new(db.notebook_store());
        let backend = ApiBackend::new(Arc::clone(&notebooks) as Arc<dyn NotebookStore>).unwrap();

        let remote = ApiNote {
            id: 9,
            etag: None,
            title: "t".to_string(),
            content: Some("c".to_string()),
            category: "Journal".to_string(),
            favorite: false,
            modified: 100,
            read_only: None,
        };
        let note = backend.local_note_from(&remote).await.unwrap().unwrap();
        let notebook_id = note.notebook_id.unwrap();
        assert_eq!(
            notebooks.get_by_id(notebook_id).unwrap().unwrap().name,
            "Journal"
        );

        // Second import reuses the same notebook.
        let again = backend.local_note_from(&remote).await.unwrap().unwrap();
        assert_eq!(again.notebook_id, Some(notebook_id));
    }

    #[tokio::test]
    async fn test_sync_note_from_carries_mapping_identity() {
        let backend = backend();
        let note = Note {
            id: 1,
            is_pinned: true,
            ..Note::new("t", "body")
        };
        let mapping = IdMapping {
            local_note_id: 1,
            backend: BackendKind::RemoteApi,
            remote_id: Some(9),
            etag: Some("abc".to_string()),
            location: None,
            is_deleted_locally: false,
            is_being_updated: false,
        };
        let wire = backend.sync_note_from(&note, &mapping).await.unwrap();
        assert_eq!(wire.id, 9);
        assert_eq!(wire.etag.as_deref(), Some("abc"));
        assert!(wire.favorite);
        assert_eq!(wire.content.as_deref(), Some("body"));
    }
}
