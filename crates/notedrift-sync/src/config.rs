//! Sync configuration values
//!
//! Configs are immutable values rebuilt whenever the relevant preference
//! changes; the coordinator derives the active provider from them with a
//! pure function, never by mutating in place.

use serde::{Deserialize, Serialize};

use crate::api::ApiConfig;
use crate::connectivity::SyncMode;
use crate::fs::FsConfig;

/// Backend selection, as a closed tagged variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendChoice {
    /// Syncing is turned off
    #[default]
    Disabled,
    /// Notes-over-HTTP service
    RemoteApi(ApiConfig),
    /// User-chosen directory
    FileSystem(FsConfig),
}

/// Backend-specific connection parameters, used for override configs on
/// `authenticate` / `is_server_compatible` probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderConfig {
    /// Remote-API connection parameters
    RemoteApi(ApiConfig),
    /// File-system storage root
    FileSystem(FsConfig),
}

/// Everything the coordinator needs to derive its active provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Which backend (if any) is selected
    pub backend: BackendChoice,
    /// Connectivity policy preference
    pub sync_mode: SyncMode,
}

impl SyncSettings {
    /// Settings with syncing turned off
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            backend: BackendChoice::Disabled,
            sync_mode: SyncMode::WifiOnly,
        }
    }
}
