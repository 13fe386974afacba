//! Sync coordinator
//!
//! A single worker task owns all backend traffic. Callers submit
//! requests over a channel and await the outcome on a oneshot reply;
//! requests are handled strictly in submission order, so two syncs can
//! never interleave.

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};

use notedrift_core::db::{IdMappingStore, NoteStore, NotebookStore};
use notedrift_core::{BackendKind, Note};

use crate::api::ApiBackend;
use crate::backend::Backend;
use crate::config::{BackendChoice, ProviderConfig, SyncSettings};
use crate::connectivity::{connection_allows, Connectivity, SyncMode};
use crate::fs::FsBackend;
use crate::manager::BackendManager;
use crate::result::SyncOutcome;

const REQUEST_QUEUE_DEPTH: usize = 32;

/// One unit of work for the sync worker.
#[derive(Debug)]
pub enum SyncRequest {
    /// Full two-way reconciliation
    Sync,
    /// Push a newly created note
    CreateNote(Note),
    /// Push an updated note
    UpdateNote(Note),
    /// Delete the remote copy of a note
    DeleteNote(Note),
    /// Update if mapped, create otherwise
    UpdateOrCreate(Note),
    /// Credential check, optionally against candidate settings
    Authenticate(Option<ProviderConfig>),
    /// Server compatibility probe, optionally against candidate settings
    IsServerCompatible(Option<ProviderConfig>),
}

impl fmt::Display for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::CreateNote(_) => write!(f, "create note"),
            Self::UpdateNote(_) => write!(f, "update note"),
            Self::DeleteNote(_) => write!(f, "delete note"),
            Self::UpdateOrCreate(_) => write!(f, "update or create note"),
            Self::Authenticate(_) => write!(f, "authenticate"),
            Self::IsServerCompatible(_) => write!(f, "server compatibility check"),
        }
    }
}

/// The configured backend behind a uniform dispatch surface.
///
/// A closed enum rather than a trait object: backend methods return
/// `impl Future`, so dynamic dispatch is off the table anyway, and the
/// set of backends is fixed.
pub(crate) enum ActiveProvider {
    RemoteApi(BackendManager<ApiBackend>),
    FileSystem(BackendManager<FsBackend>),
}

impl ActiveProvider {
    pub(crate) const fn kind(&self) -> BackendKind {
        match self {
            Self::RemoteApi(manager) => manager.kind(),
            Self::FileSystem(manager) => manager.kind(),
        }
    }

    async fn dispatch<B: Backend>(
        manager: &BackendManager<B>,
        request: SyncRequest,
    ) -> SyncOutcome {
        match request {
            SyncRequest::Sync => manager.sync().await,
            SyncRequest::CreateNote(note) => manager.create_note(&note).await,
            SyncRequest::UpdateNote(note) => manager.update_note(&note).await,
            SyncRequest::DeleteNote(note) => manager.delete_note(&note).await,
            SyncRequest::UpdateOrCreate(note) => manager.update_or_create(&note).await,
            SyncRequest::Authenticate(config) => manager.authenticate(config).await,
            SyncRequest::IsServerCompatible(config) => manager.is_server_compatible(config).await,
        }
    }

    async fn handle(&self, request: SyncRequest) -> SyncOutcome {
        match self {
            Self::RemoteApi(manager) => Self::dispatch(manager, request).await,
            Self::FileSystem(manager) => Self::dispatch(manager, request).await,
        }
    }
}

/// A request plus the provider and policy it was submitted under.
///
/// Both are pinned when the request is submitted, so a reconfigure that
/// lands mid-queue never changes what an already-submitted request does.
struct Envelope {
    request: SyncRequest,
    provider: Option<Arc<ActiveProvider>>,
    sync_mode: SyncMode,
    reply: oneshot::Sender<SyncOutcome>,
}

fn build_provider(
    choice: &BackendChoice,
    notes: &Arc<dyn NoteStore>,
    notebooks: &Arc<dyn NotebookStore>,
    mappings: &Arc<dyn IdMappingStore>,
) -> Result<Option<Arc<ActiveProvider>>, SyncOutcome> {
    match choice {
        BackendChoice::Disabled => Ok(None),
        BackendChoice::RemoteApi(config) => {
            let backend = ApiBackend::new(Arc::clone(notebooks))
                .map_err(|error| SyncOutcome::GenericError(error.to_string()))?;
            Ok(Some(Arc::new(ActiveProvider::RemoteApi(
                BackendManager::new(
                    backend,
                    config.clone(),
                    Arc::clone(notes),
                    Arc::clone(mappings),
                ),
            ))))
        }
        BackendChoice::FileSystem(config) => Ok(Some(Arc::new(ActiveProvider::FileSystem(
            BackendManager::new(
                FsBackend::new(),
                config.clone(),
                Arc::clone(notes),
                Arc::clone(mappings),
            ),
        )))),
    }
}

fn choice_from(config: ProviderConfig) -> BackendChoice {
    match config {
        ProviderConfig::RemoteApi(config) => BackendChoice::RemoteApi(config),
        ProviderConfig::FileSystem(config) => BackendChoice::FileSystem(config),
    }
}

struct Worker {
    requests: mpsc::Receiver<Envelope>,
    connectivity: Arc<dyn Connectivity>,
    notes: Arc<dyn NoteStore>,
    notebooks: Arc<dyn NotebookStore>,
    mappings: Arc<dyn IdMappingStore>,
}

impl Worker {
    async fn run(mut self) {
        while let Some(envelope) = self.requests.recv().await {
            let outcome = self.handle(envelope.request, envelope.provider, envelope.sync_mode).await;
            // A caller that stopped waiting is not an error.
            let _ = envelope.reply.send(outcome);
        }
        tracing::debug!("sync worker shutting down");
    }

    async fn handle(
        &self,
        request: SyncRequest,
        provider: Option<Arc<ActiveProvider>>,
        sync_mode: SyncMode,
    ) -> SyncOutcome {
        let provider = match provider {
            Some(provider) => provider,
            // Credential and compatibility probes against candidate
            // settings work even before any backend is enabled.
            None => match self.transient_provider_for(&request) {
                Ok(Some(provider)) => provider,
                Ok(None) => return SyncOutcome::SyncingNotEnabled,
                Err(outcome) => return outcome,
            },
        };
        if !connection_allows(self.connectivity.state(), sync_mode) {
            return SyncOutcome::NoConnectivity;
        }
        tracing::info!(backend = %provider.kind(), request = %request, "handling sync request");
        let outcome = provider.handle(request).await;
        tracing::debug!(outcome = %outcome, "sync request finished");
        outcome
    }

    fn transient_provider_for(
        &self,
        request: &SyncRequest,
    ) -> Result<Option<Arc<ActiveProvider>>, SyncOutcome> {
        let config = match request {
            SyncRequest::Authenticate(Some(config))
            | SyncRequest::IsServerCompatible(Some(config)) => config.clone(),
            _ => return Ok(None),
        };
        build_provider(
            &choice_from(config),
            &self.notes,
            &self.notebooks,
            &self.mappings,
        )
    }
}

struct Shared {
    provider: RwLock<Option<Arc<ActiveProvider>>>,
    sync_mode: RwLock<SyncMode>,
}

/// Handle to the sync worker.
///
/// Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct SyncCoordinator {
    requests: mpsc::Sender<Envelope>,
    shared: Arc<Shared>,
    notes: Arc<dyn NoteStore>,
    notebooks: Arc<dyn NotebookStore>,
    mappings: Arc<dyn IdMappingStore>,
}

impl SyncCoordinator {
    /// Spawn the worker and derive the initial provider from `settings`.
    ///
    /// Settings that fail to produce a provider leave syncing disabled
    /// rather than failing construction; `reconfigure` can fix it later.
    #[must_use]
    pub fn new(
        notes: Arc<dyn NoteStore>,
        notebooks: Arc<dyn NotebookStore>,
        mappings: Arc<dyn IdMappingStore>,
        connectivity: Arc<dyn Connectivity>,
        settings: &SyncSettings,
    ) -> Self {
        let provider = build_provider(&settings.backend, &notes, &notebooks, &mappings)
            .unwrap_or_else(|outcome| {
                tracing::warn!(%outcome, "initial sync settings rejected, starting disabled");
                None
            });
        let shared = Arc::new(Shared {
            provider: RwLock::new(provider),
            sync_mode: RwLock::new(settings.sync_mode),
        });
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let worker = Worker {
            requests: rx,
            connectivity,
            notes: Arc::clone(&notes),
            notebooks: Arc::clone(&notebooks),
            mappings: Arc::clone(&mappings),
        };
        tokio::spawn(worker.run());
        Self {
            requests: tx,
            shared,
            notes,
            notebooks,
            mappings,
        }
    }

    /// Whether a backend is currently configured
    #[must_use]
    pub fn is_syncing_enabled(&self) -> bool {
        self.shared
            .provider
            .read()
            .is_ok_and(|provider| provider.is_some())
    }

    /// Swap the active backend and connectivity policy.
    ///
    /// Requests already in the queue keep the provider they were
    /// submitted under.
    pub fn reconfigure(&self, settings: &SyncSettings) -> SyncOutcome {
        match build_provider(&settings.backend, &self.notes, &self.notebooks, &self.mappings) {
            Ok(provider) => {
                if let Ok(mut slot) = self.shared.provider.write() {
                    *slot = provider;
                }
                if let Ok(mut mode) = self.shared.sync_mode.write() {
                    *mode = settings.sync_mode;
                }
                SyncOutcome::Success
            }
            Err(outcome) => outcome,
        }
    }

    /// Run a full reconciliation
    pub async fn sync(&self) -> SyncOutcome {
        self.submit(SyncRequest::Sync).await
    }

    /// Push a newly created note to the backend
    pub async fn create_note(&self, note: Note) -> SyncOutcome {
        self.submit(SyncRequest::CreateNote(note)).await
    }

    /// Push the current state of a mapped note
    pub async fn update_note(&self, note: Note) -> SyncOutcome {
        self.submit(SyncRequest::UpdateNote(note)).await
    }

    /// Delete the remote copy of a note
    pub async fn delete_note(&self, note: Note) -> SyncOutcome {
        self.submit(SyncRequest::DeleteNote(note)).await
    }

    /// Update the remote copy, creating it if not yet mapped
    pub async fn update_or_create(&self, note: Note) -> SyncOutcome {
        self.submit(SyncRequest::UpdateOrCreate(note)).await
    }

    /// Validate credentials, against candidate settings when given
    pub async fn authenticate(&self, config: Option<ProviderConfig>) -> SyncOutcome {
        self.submit(SyncRequest::Authenticate(config)).await
    }

    /// Probe server compatibility, against candidate settings when given
    pub async fn is_server_compatible(&self, config: Option<ProviderConfig>) -> SyncOutcome {
        self.submit(SyncRequest::IsServerCompatible(config)).await
    }

    async fn submit(&self, request: SyncRequest) -> SyncOutcome {
        let provider = self
            .shared
            .provider
            .read()
            .map_or(None, |provider| provider.clone());
        let sync_mode = self
            .shared
            .sync_mode
            .read()
            .map_or_else(|_| SyncMode::default(), |mode| *mode);
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            request,
            provider,
            sync_mode,
            reply: reply_tx,
        };
        if self.requests.send(envelope).await.is_err() {
            return SyncOutcome::Cancelled;
        }
        reply_rx.await.unwrap_or(SyncOutcome::Cancelled)
    }
}
