//! Backend contract
//!
//! One implementation per transport. Every operation returns a
//! [`TransportResult`]; causes are pattern-matched by the caller, never
//! thrown across the contract boundary.

use notedrift_core::{BackendKind, IdMapping, Note};

use crate::config::ProviderConfig;
use crate::result::{SyncOutcome, TransportResult};

/// A backend-specific projection of a note, alive only for the duration
/// of one transport call. It carries enough information to reconstruct an
/// [`IdMapping`] after a successful create.
pub trait SyncNote {
    /// Note title
    fn title(&self) -> &str;

    /// Body content; listings may omit it until fetched
    fn content(&self) -> Option<&str>;

    /// Modification timestamp (Unix ms)
    fn modified(&self) -> i64;

    /// Pinned/favorite state, for backends that track it
    fn pinned(&self) -> Option<bool>;

    /// Server-assigned identity, if the backend uses one
    fn remote_id(&self) -> Option<i64>;

    /// Storage location, if the backend uses one
    fn location(&self) -> Option<&str>;

    /// Derive the mapping that ties this remote copy to `note`
    fn id_mapping_for(&self, note: &Note) -> IdMapping;
}

/// One concrete sync transport.
///
/// Statically dispatched: the coordinator selects the implementation via
/// a closed enum, not runtime casts.
pub trait Backend: Send + Sync {
    /// Immutable connection parameters for this backend
    type Config: Clone + Send + Sync + 'static;
    /// The transient note projection this backend works with
    type Note: SyncNote + Clone + Send + Sync;

    /// Which backend this is
    const KIND: BackendKind;

    /// Extract this backend's concrete config from an override value
    fn config_from(config: ProviderConfig) -> Option<Self::Config>;

    /// Authoritative remote listing; content may be deferred
    fn list(
        &self,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = TransportResult<Vec<Self::Note>>> + Send;

    /// Create the remote copy of a local note
    fn create_note(
        &self,
        note: &Note,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = TransportResult<Self::Note>> + Send;

    /// Fetch the full content of a listed note
    fn note_content(
        &self,
        note: &Self::Note,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = TransportResult<Self::Note>> + Send;

    /// Overwrite the remote copy
    fn update_note(
        &self,
        note: &Self::Note,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = TransportResult<()>> + Send;

    /// Remove the remote copy
    fn delete_note(
        &self,
        note: &Self::Note,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = TransportResult<()>> + Send;

    /// Reconstruct the transient view of an already-mapped note, for
    /// update and delete calls
    fn sync_note_from(
        &self,
        note: &Note,
        mapping: &IdMapping,
    ) -> impl std::future::Future<Output = TransportResult<Self::Note>> + Send;

    /// Project a remote note into a new local note.
    ///
    /// Returns `Ok(None)` for remote entries that cannot be imported
    /// (e.g. files with an unrecognized extension).
    fn local_note_from(
        &self,
        remote: &Self::Note,
    ) -> impl std::future::Future<Output = TransportResult<Option<Note>>> + Send;

    /// Fold newer remote state into an existing local note, preserving
    /// its identity and local-only bookkeeping
    fn merge_into_local(
        &self,
        local: &Note,
        remote: &Self::Note,
    ) -> impl std::future::Future<Output = TransportResult<Note>> + Send;

    /// Repair location drift for a retitled note.
    ///
    /// Returns the new location when the backend moved the remote copy,
    /// `Ok(None)` when nothing had to change.
    fn relocate(
        &self,
        note: &Note,
        remote: &Self::Note,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = TransportResult<Option<String>>> + Send;

    /// Validate credentials with a harmless read-only call
    fn authenticate(
        &self,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = SyncOutcome> + Send;

    /// Check that the server speaks a supported API version
    fn is_server_compatible(
        &self,
        config: &Self::Config,
    ) -> impl std::future::Future<Output = SyncOutcome> + Send;
}
