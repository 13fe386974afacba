//! Backend manager: adapts one backend into the sync provider surface
//!
//! Wraps a [`Backend`] plus its config and the local stores, handling
//! id-mapping bookkeeping around single-note operations and driving the
//! two-phase reconciliation for a full sync.

use std::sync::Arc;

use notedrift_core::db::{IdMappingStore, NoteStore};
use notedrift_core::{BackendKind, IdMapping, Note};

use crate::backend::{Backend, SyncNote};
use crate::config::ProviderConfig;
use crate::result::{BackendError, SyncOutcome, TransportResult};

/// One configured backend behind the uniform sync provider contract.
pub struct BackendManager<B: Backend> {
    backend: B,
    config: B::Config,
    notes: Arc<dyn NoteStore>,
    mappings: Arc<dyn IdMappingStore>,
}

impl<B: Backend> BackendManager<B> {
    /// Wrap a backend with its config and store handles
    pub const fn new(
        backend: B,
        config: B::Config,
        notes: Arc<dyn NoteStore>,
        mappings: Arc<dyn IdMappingStore>,
    ) -> Self {
        Self {
            backend,
            config,
            notes,
            mappings,
        }
    }

    /// Which backend this provider syncs against
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        B::KIND
    }

    #[cfg(test)]
    pub(crate) const fn backend_ref(&self) -> &B {
        &self.backend
    }

    fn store_error(error: &notedrift_core::Error) -> SyncOutcome {
        SyncOutcome::GenericError(error.to_string())
    }

    /// Create the remote copy of a note and record its mapping.
    pub async fn create_note(&self, note: &Note) -> SyncOutcome {
        if note.is_local_only {
            return SyncOutcome::OperationNotSupported(
                "local-only notes are excluded from sync".to_string(),
            );
        }
        match self.backend.create_note(note, &self.config).await {
            Ok(remote) => match self.mappings.assign_backend_to_note(&remote.id_mapping_for(note))
            {
                Ok(()) => SyncOutcome::Success,
                Err(error) => Self::store_error(&error),
            },
            Err(error) => error.to_outcome(),
        }
    }

    /// Push a local note's current state to its mapped remote copy.
    pub async fn update_note(&self, note: &Note) -> SyncOutcome {
        let mapping = match self.mappings.get_by_local_id_and_backend(note.id, B::KIND) {
            Ok(Some(mapping)) => mapping,
            Ok(None) => return SyncOutcome::GenericError("no id mapping found".to_string()),
            Err(error) => return Self::store_error(&error),
        };
        let sync_note = match self.backend.sync_note_from(note, &mapping).await {
            Ok(sync_note) => sync_note,
            Err(error) => return error.to_outcome(),
        };
        match self.backend.update_note(&sync_note, &self.config).await {
            Ok(()) => SyncOutcome::Success,
            Err(error) => error.to_outcome(),
        }
    }

    /// Remove the remote copy of a note and drop its mapping.
    pub async fn delete_note(&self, note: &Note) -> SyncOutcome {
        let mapping = match self.mappings.get_by_local_id_and_backend(note.id, B::KIND) {
            Ok(Some(mapping)) => mapping,
            Ok(None) => return SyncOutcome::GenericError("no id mapping found".to_string()),
            Err(error) => return Self::store_error(&error),
        };
        let sync_note = match self.backend.sync_note_from(note, &mapping).await {
            Ok(sync_note) => sync_note,
            Err(error) => return error.to_outcome(),
        };
        match self.backend.delete_note(&sync_note, &self.config).await {
            // An already-absent remote copy satisfies the delete intent.
            Ok(()) | Err(BackendError::NotFound) => {
                match self.mappings.delete_many(std::slice::from_ref(&mapping)) {
                    Ok(()) => SyncOutcome::Success,
                    Err(error) => Self::store_error(&error),
                }
            }
            Err(error) => error.to_outcome(),
        }
    }

    /// Update when a mapping exists, create otherwise.
    ///
    /// This is what an interactive editor calls after each local save.
    pub async fn update_or_create(&self, note: &Note) -> SyncOutcome {
        match self.mappings.get_by_local_id_and_backend(note.id, B::KIND) {
            Ok(Some(_)) => self.update_note(note).await,
            Ok(None) => self.create_note(note).await,
            Err(error) => Self::store_error(&error),
        }
    }

    /// Validate credentials, optionally against an override config.
    pub async fn authenticate(&self, override_config: Option<ProviderConfig>) -> SyncOutcome {
        match override_config {
            None => self.backend.authenticate(&self.config).await,
            Some(config) => match B::config_from(config) {
                Some(config) => self.backend.authenticate(&config).await,
                None => SyncOutcome::InvalidConfig,
            },
        }
    }

    /// Probe server compatibility, optionally against an override config.
    pub async fn is_server_compatible(
        &self,
        override_config: Option<ProviderConfig>,
    ) -> SyncOutcome {
        match override_config {
            None => self.backend.is_server_compatible(&self.config).await,
            Some(config) => match B::config_from(config) {
                Some(config) => self.backend.is_server_compatible(&config).await,
                None => SyncOutcome::InvalidConfig,
            },
        }
    }

    /// Full two-phase reconciliation between the local store and this
    /// backend.
    ///
    /// Phase 1 folds remote state into the local store; phase 2 pushes
    /// local creations and deletions outward. Per-item failures are
    /// logged and skipped so one bad note never aborts the batch.
    pub async fn sync(&self) -> SyncOutcome {
        let kind = B::KIND;

        let remote_notes = match self.backend.list(&self.config).await {
            Ok(notes) => notes,
            Err(error) => return error.to_outcome(),
        };
        let known_mappings = match self.mappings.get_all_by_backend(kind) {
            Ok(mappings) => mappings,
            Err(error) => return Self::store_error(&error),
        };
        tracing::info!(
            backend = %kind,
            remote = remote_notes.len(),
            mapped = known_mappings.len(),
            "starting reconciliation"
        );

        // Phase 1: remote -> local.
        let mut seen_local_ids: Vec<i64> = Vec::new();
        for remote in &remote_notes {
            let mapping = known_mappings
                .iter()
                .find(|m| m.matches(remote.remote_id(), remote.location()));
            match mapping {
                None => match self.import_remote(remote).await {
                    // Imported notes count as seen, or the deletion sweep
                    // below would trash them in the same cycle.
                    Ok(Some(local_id)) => seen_local_ids.push(local_id),
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(title = remote.title(), %error, "skipping remote import");
                    }
                },
                Some(mapping) => {
                    seen_local_ids.push(mapping.local_note_id);
                    if mapping.is_deleted_locally {
                        // The local delete intent wins over the remote copy.
                        if let Err(error) = self.delete_remote(remote, mapping).await {
                            tracing::warn!(
                                local_id = mapping.local_note_id,
                                %error,
                                "failed to delete remote copy of locally deleted note"
                            );
                        }
                        continue;
                    }
                    if mapping.is_being_updated {
                        continue;
                    }
                    if let Err(error) = self.pull_if_newer(remote, mapping).await {
                        tracing::warn!(
                            local_id = mapping.local_note_id,
                            %error,
                            "skipping inbound update"
                        );
                    }
                }
            }
        }

        // Remote copies that disappeared: trash the local note and drop
        // the mapping, except where the local delete intent already won.
        if let Err(error) = self
            .notes
            .move_remotely_deleted_to_trash(&seen_local_ids, kind)
        {
            return Self::store_error(&error);
        }
        if let Err(error) = self
            .mappings
            .unassign_backend_from_remotely_deleted(&seen_local_ids, kind)
        {
            return Self::store_error(&error);
        }

        // Phase 2: local -> remote.
        let new_local = match self.notes.get_non_remote_notes(kind) {
            Ok(notes) => notes,
            Err(error) => return Self::store_error(&error),
        };
        for note in &new_local {
            match self.backend.create_note(note, &self.config).await {
                Ok(remote) => {
                    if let Err(error) =
                        self.mappings.assign_backend_to_note(&remote.id_mapping_for(note))
                    {
                        tracing::warn!(local_id = note.id, %error, "failed to record new mapping");
                    }
                }
                Err(error) => {
                    tracing::warn!(local_id = note.id, %error, "failed to push new note");
                }
            }
        }

        let mapped_pairs = match self.notes.get_notes_by_backend(kind) {
            Ok(pairs) => pairs,
            Err(error) => return Self::store_error(&error),
        };
        for (mapping, local) in &mapped_pairs {
            if mapping.is_being_updated {
                continue;
            }
            let should_remove = mapping.is_deleted_locally
                || local
                    .as_ref()
                    .is_none_or(|note| note.is_deleted || note.is_local_only);
            if should_remove {
                let stub = local.clone().unwrap_or_else(|| Note {
                    id: mapping.local_note_id,
                    ..Note::default()
                });
                if let Err(error) = self.push_delete(&stub, mapping).await {
                    tracing::warn!(
                        local_id = mapping.local_note_id,
                        %error,
                        "failed to delete remote copy"
                    );
                }
                continue;
            }
            // Location drift: a retitled note wants its file renamed, not
            // a delete+recreate.
            if let Some(note) = local {
                let remote = remote_notes
                    .iter()
                    .find(|r| mapping.matches(r.remote_id(), r.location()));
                if let Some(remote) = remote {
                    if let Err(error) = self.repair_location(note, remote, mapping).await {
                        tracing::warn!(local_id = note.id, %error, "failed to repair location");
                    }
                }
            }
        }

        tracing::info!(backend = %kind, "reconciliation finished");
        SyncOutcome::Success
    }

    /// Fetch full content when the listing deferred it.
    async fn with_content(&self, remote: &B::Note) -> TransportResult<B::Note> {
        if remote.content().is_some() {
            Ok(remote.clone())
        } else {
            self.backend.note_content(remote, &self.config).await
        }
    }

    async fn import_remote(&self, remote: &B::Note) -> TransportResult<Option<i64>> {
        let full = self.with_content(remote).await?;
        let Some(new_note) = self.backend.local_note_from(&full).await? else {
            tracing::debug!(title = remote.title(), "remote entry is not importable");
            return Ok(None);
        };
        let local_id = self
            .notes
            .insert_note(&new_note, true)
            .map_err(|error| BackendError::Store(error.to_string()))?;
        let persisted = Note {
            id: local_id,
            ..new_note
        };
        self.mappings
            .insert(&full.id_mapping_for(&persisted))
            .map_err(|error| BackendError::Store(error.to_string()))?;
        tracing::debug!(local_id, title = persisted.title, "imported remote note");
        Ok(Some(local_id))
    }

    async fn delete_remote(&self, remote: &B::Note, mapping: &IdMapping) -> TransportResult<()> {
        match self.backend.delete_note(remote, &self.config).await {
            Ok(()) | Err(BackendError::NotFound) => {}
            Err(error) => return Err(error),
        }
        self.mappings
            .delete_many(std::slice::from_ref(mapping))
            .map_err(|error| BackendError::Store(error.to_string()))?;
        Ok(())
    }

    async fn pull_if_newer(&self, remote: &B::Note, mapping: &IdMapping) -> TransportResult<()> {
        let Some(local) = self
            .notes
            .get_by_id(mapping.local_note_id)
            .map_err(|error| BackendError::Store(error.to_string()))?
        else {
            return Ok(());
        };

        let remote_newer = remote.modified() > local.modified;
        // Some backends do not bump the timestamp on a favorite toggle,
        // so remote pinned state is authoritative even on equal stamps.
        let pin_drift = remote.modified() == local.modified
            && remote.pinned().is_some_and(|pinned| pinned != local.is_pinned);

        if remote_newer || pin_drift {
            let full = self.with_content(remote).await?;
            let merged = self.backend.merge_into_local(&local, &full).await?;
            self.notes
                .update_note(&merged, true)
                .map_err(|error| BackendError::Store(error.to_string()))?;
            self.refresh_mapping(&full, mapping, &local)?;
            tracing::debug!(local_id = local.id, "pulled newer remote content");
        } else {
            // Content stands still, but keep the entity tag current so the
            // next conditional update does not trip over a stale one.
            self.refresh_mapping(remote, mapping, &local)?;
        }
        Ok(())
    }

    fn refresh_mapping(
        &self,
        remote: &B::Note,
        mapping: &IdMapping,
        local: &Note,
    ) -> TransportResult<()> {
        let fresh = remote.id_mapping_for(local);
        if fresh.etag != mapping.etag || fresh.location != mapping.location {
            let updated = IdMapping {
                is_deleted_locally: mapping.is_deleted_locally,
                is_being_updated: mapping.is_being_updated,
                ..fresh
            };
            self.mappings
                .update(&updated)
                .map_err(|error| BackendError::Store(error.to_string()))?;
        }
        Ok(())
    }

    async fn push_delete(&self, note: &Note, mapping: &IdMapping) -> TransportResult<()> {
        let sync_note = self.backend.sync_note_from(note, mapping).await?;
        match self.backend.delete_note(&sync_note, &self.config).await {
            Ok(()) | Err(BackendError::NotFound) => {}
            Err(error) => return Err(error),
        }
        self.mappings
            .delete_many(std::slice::from_ref(mapping))
            .map_err(|error| BackendError::Store(error.to_string()))?;
        Ok(())
    }

    async fn repair_location(
        &self,
        note: &Note,
        remote: &B::Note,
        mapping: &IdMapping,
    ) -> TransportResult<()> {
        if let Some(new_location) = self.backend.relocate(note, remote, &self.config).await? {
            let updated = IdMapping {
                location: Some(new_location),
                ..mapping.clone()
            };
            self.mappings
                .update(&updated)
                .map_err(|error| BackendError::Store(error.to_string()))?;
        }
        Ok(())
    }
}
