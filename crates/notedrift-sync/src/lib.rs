//! notedrift-sync - Multi-backend note synchronization engine
//!
//! Reconciles the local note store against one configured remote store
//! (a notes-over-HTTP service or a directory on disk). All sync work is
//! serialized through a single [`coordinator::SyncCoordinator`], which
//! dispatches to the active [`manager::BackendManager`].

pub mod api;
pub mod backend;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod fs;
pub mod manager;
pub mod result;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{BackendChoice, ProviderConfig, SyncSettings};
pub use connectivity::{Connectivity, NetworkState, SyncMode};
pub use coordinator::SyncCoordinator;
pub use result::{BackendError, SyncOutcome, TransportResult};
