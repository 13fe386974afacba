//! Outcome taxonomy for sync operations

use std::fmt;

use thiserror::Error;

/// Result type alias for backend transport calls
pub type TransportResult<T> = Result<T, BackendError>;

/// Failure cause inside one backend transport call.
///
/// Raw transport errors are caught at the backend boundary and wrapped
/// here; they never cross into the coordinator as panics.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a non-success status
    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    /// Entity tag mismatch on a conditional update
    #[error("entity tag mismatch, remote copy has changed")]
    Conflict,

    /// Missing read/write grants on the configured storage root
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The remote copy does not exist
    #[error("remote note not found")]
    NotFound,

    /// The server payload could not be interpreted
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The server does not speak a supported API version
    #[error("server not supported")]
    Incompatible,

    /// Local store failure during backend bookkeeping
    #[error("local store error: {0}")]
    Store(String),
}

impl BackendError {
    /// Translate a transport cause into the operation outcome taxonomy
    #[must_use]
    pub fn to_outcome(&self) -> SyncOutcome {
        match self {
            Self::Api { code: 401, .. } => SyncOutcome::Unauthorized,
            Self::Api { code, message } => SyncOutcome::ApiError {
                code: *code,
                message: message.clone(),
            },
            Self::Conflict => SyncOutcome::ApiError {
                code: 412,
                message: self.to_string(),
            },
            Self::PermissionDenied(reason) => SyncOutcome::OperationNotSupported(reason.clone()),
            Self::Incompatible => SyncOutcome::ServerNotSupported,
            Self::Http(_) | Self::Io(_) | Self::NotFound | Self::InvalidPayload(_) | Self::Store(_) => {
                SyncOutcome::GenericError(self.to_string())
            }
        }
    }
}

/// The closed set of outcomes every sync operation resolves to.
///
/// Exactly one of these is returned per operation; none are silently
/// swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The operation completed
    Success,
    /// Connectivity policy forbids sync right now
    NoConnectivity,
    /// No sync backend is configured
    SyncingNotEnabled,
    /// The supplied configuration does not fit the active backend
    InvalidConfig,
    /// The server's advertised API versions are all too old
    ServerNotSupported,
    /// Credentials were rejected
    Unauthorized,
    /// The backend cannot perform this operation
    OperationNotSupported(String),
    /// The server answered with an error status
    ApiError { code: u16, message: String },
    /// Anything else that went wrong
    GenericError(String),
    /// A security restriction blocked the operation
    SecurityError(String),
    /// The coordinating task went away before fulfilling the request
    Cancelled,
}

impl SyncOutcome {
    /// Whether this outcome represents a completed operation
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::NoConnectivity => write!(f, "NoConnectivity"),
            Self::SyncingNotEnabled => write!(f, "SyncingNotEnabled"),
            Self::InvalidConfig => write!(f, "InvalidConfig"),
            Self::ServerNotSupported => write!(f, "ServerNotSupported"),
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::OperationNotSupported(reason) => write!(f, "OperationNotSupported: {reason}"),
            Self::ApiError { code, message } => write!(f, "ApiError {code}: {message}"),
            Self::GenericError(message) => write!(f, "GenericError: {message}"),
            Self::SecurityError(message) => write!(f, "SecurityError: {message}"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_status_maps_to_unauthorized() {
        let error = BackendError::Api {
            code: 401,
            message: "nope".to_string(),
        };
        assert_eq!(error.to_outcome(), SyncOutcome::Unauthorized);
    }

    #[test]
    fn test_conflict_is_distinguishable() {
        let outcome = BackendError::Conflict.to_outcome();
        assert!(matches!(outcome, SyncOutcome::ApiError { code: 412, .. }));
    }

    #[test]
    fn test_permission_denied_maps_to_operation_not_supported() {
        let outcome = BackendError::PermissionDenied("no grant".to_string()).to_outcome();
        assert_eq!(
            outcome,
            SyncOutcome::OperationNotSupported("no grant".to_string())
        );
    }
}
