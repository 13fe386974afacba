//! Connectivity policy

use serde::{Deserialize, Serialize};

/// Current network transport, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// Wi-Fi network
    Wifi,
    /// Wired network
    Ethernet,
    /// Metered cellular network
    Cellular,
    /// No active network
    Offline,
}

/// When the user allows sync to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Only on unmetered connections
    #[default]
    WifiOnly,
    /// On any connection, cellular included
    Always,
}

/// Source of the current network state.
///
/// Injected into the coordinator so tests and platforms can supply their
/// own probe.
pub trait Connectivity: Send + Sync {
    /// The network state at this moment
    fn state(&self) -> NetworkState;
}

/// Whether the connectivity policy permits sync right now.
///
/// Wi-Fi and Ethernet always permit; Cellular only when the mode is
/// [`SyncMode::Always`]; no network never permits.
#[must_use]
pub const fn connection_allows(state: NetworkState, mode: SyncMode) -> bool {
    match state {
        NetworkState::Wifi | NetworkState::Ethernet => true,
        NetworkState::Cellular => matches!(mode, SyncMode::Always),
        NetworkState::Offline => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        assert!(connection_allows(NetworkState::Wifi, SyncMode::WifiOnly));
        assert!(connection_allows(NetworkState::Ethernet, SyncMode::WifiOnly));
        assert!(!connection_allows(NetworkState::Cellular, SyncMode::WifiOnly));
        assert!(connection_allows(NetworkState::Cellular, SyncMode::Always));
        assert!(!connection_allows(NetworkState::Offline, SyncMode::Always));
    }
}
