//! In-memory fakes shared across unit tests

use std::collections::HashSet;
use std::sync::Mutex;

use notedrift_core::{BackendKind, IdMapping, Note};

use crate::backend::{Backend, SyncNote};
use crate::config::ProviderConfig;
use crate::connectivity::{Connectivity, NetworkState};
use crate::result::{BackendError, SyncOutcome, TransportResult};

/// Route engine logs to the test output.
///
/// Call at the top of a test while debugging it, then filter with
/// `RUST_LOG`.
#[allow(dead_code)]
pub fn capture_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Connectivity probe with a settable state.
pub struct FakeConnectivity {
    state: Mutex<NetworkState>,
}

impl FakeConnectivity {
    pub fn new(state: NetworkState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn set(&self, state: NetworkState) {
        *self.state.lock().unwrap() = state;
    }
}

impl Connectivity for FakeConnectivity {
    fn state(&self) -> NetworkState {
        *self.state.lock().unwrap()
    }
}

/// Mutation counters on a [`ScriptedBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedNote {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub modified: i64,
    pub favorite: bool,
}

impl SyncNote for ScriptedNote {
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
        Some(self.id)
    }

    fn location(&self) -> Option<&str> {
        None
    }

    fn id_mapping_for(&self, note: &Note) -> IdMapping {
        IdMapping {
            local_note_id: note.id,
            backend: BackendKind::RemoteApi,
            remote_id: Some(self.id),
            etag: None,
            location: None,
            is_deleted_locally: false,
            is_being_updated: false,
        }
    }
}

#[derive(Default)]
struct ScriptedState {
    notes: Vec<ScriptedNote>,
    next_id: i64,
    fail_content: HashSet<i64>,
    calls: Calls,
}

/// Scriptable in-memory backend.
///
/// Listings omit content so reconciliation is forced through the
/// deferred-content fetch path, like the HTTP backend.
pub struct ScriptedBackend {
    state: Mutex<ScriptedState>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                next_id: 1,
                ..ScriptedState::default()
            }),
        }
    }

    pub fn seed_remote(&self, title: &str, content: &str, modified: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.notes.push(ScriptedNote {
            id,
            title: title.to_string(),
            content: Some(content.to_string()),
            modified,
            favorite: false,
        });
        id
    }

    pub fn set_remote_favorite(&self, id: i64, favorite: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(note) = state.notes.iter_mut().find(|n| n.id == id) {
            note.favorite = favorite;
        }
    }

    pub fn fail_content_fetch(&self, id: i64) {
        self.state.lock().unwrap().fail_content.insert(id);
    }

    pub fn remote_titles(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .notes
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls
    }
}

impl Backend for ScriptedBackend {
    type Config = ();
    type Note = ScriptedNote;

    const KIND: BackendKind = BackendKind::RemoteApi;

    fn config_from(config: ProviderConfig) -> Option<Self::Config> {
        match config {
            ProviderConfig::RemoteApi(_) => Some(()),
            ProviderConfig::FileSystem(_) => None,
        }
    }

    async fn list(&self, _config: &Self::Config) -> TransportResult<Vec<Self::Note>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .notes
            .iter()
            .map(|note| ScriptedNote {
                content: None,
                ..note.clone()
            })
            .collect())
    }

    async fn create_note(&self, note: &Note, _config: &Self::Config) -> TransportResult<Self::Note> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let remote = ScriptedNote {
            id,
            title: note.title.clone(),
            content: Some(note.content.clone()),
            modified: note.modified,
            favorite: note.is_pinned,
        };
        state.notes.push(remote.clone());
        state.calls.creates += 1;
        Ok(remote)
    }

    async fn note_content(
        &self,
        note: &Self::Note,
        _config: &Self::Config,
    ) -> TransportResult<Self::Note> {
        let state = self.state.lock().unwrap();
        if state.fail_content.contains(&note.id) {
            return Err(BackendError::Api {
                code: 500,
                message: "scripted failure".to_string(),
            });
        }
        state
            .notes
            .iter()
            .find(|n| n.id == note.id)
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn update_note(&self, note: &Self::Note, _config: &Self::Config) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.notes.iter_mut().find(|n| n.id == note.id) else {
            return Err(BackendError::NotFound);
        };
        *existing = note.clone();
        state.calls.updates += 1;
        Ok(())
    }

    async fn delete_note(&self, note: &Self::Note, _config: &Self::Config) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.notes.len();
        state.notes.retain(|n| n.id != note.id);
        if state.notes.len() == before {
            return Err(BackendError::NotFound);
        }
        state.calls.deletes += 1;
        Ok(())
    }

    async fn sync_note_from(
        &self,
        note: &Note,
        mapping: &IdMapping,
    ) -> TransportResult<Self::Note> {
        Ok(ScriptedNote {
            id: mapping.remote_id.unwrap_or(0),
            title: note.title.clone(),
            content: Some(note.content.clone()),
            modified: note.modified,
            favorite: note.is_pinned,
        })
    }

    async fn local_note_from(&self, remote: &Self::Note) -> TransportResult<Option<Note>> {
        let content = remote
            .content
            .clone()
            .ok_or_else(|| BackendError::InvalidPayload("listing without content".to_string()))?;
        Ok(Some(Note {
            id: 0,
            title: remote.title.clone(),
            content,
            modified: remote.modified,
            is_pinned: remote.favorite,
            is_deleted: false,
            is_local_only: false,
            is_markdown: true,
            notebook_id: None,
        }))
    }

    async fn merge_into_local(&self, local: &Note, remote: &Self::Note) -> TransportResult<Note> {
        let content = remote
            .content
            .clone()
            .ok_or_else(|| BackendError::InvalidPayload("merge without content".to_string()))?;
        Ok(Note {
            title: remote.title.clone(),
            content,
            modified: remote.modified,
            is_pinned: remote.favorite,
            ..local.clone()
        })
    }

    async fn relocate(
        &self,
        _note: &Note,
        _remote: &Self::Note,
        _config: &Self::Config,
    ) -> TransportResult<Option<String>> {
        Ok(None)
    }

    async fn authenticate(&self, _config: &Self::Config) -> SyncOutcome {
        SyncOutcome::Success
    }

    async fn is_server_compatible(&self, _config: &Self::Config) -> SyncOutcome {
        SyncOutcome::Success
    }
}
