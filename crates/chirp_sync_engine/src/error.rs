//! Error types for the sync engine.

use chirp_protocol::{ContentError, ProtocolError};
use chirp_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Errors are `Clone` so they can be broadcast to every event subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Bad local input. Never reaches the network.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No session, or the server no longer accepts the token.
    #[error("not authenticated")]
    Unauthenticated,

    /// Login refused the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The server refused the request as malformed or conflicting
    /// (e.g. username already taken).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The target does not exist (any more).
    #[error("not found")]
    NotFound,

    /// The server failed (5xx).
    #[error("server error (status {status})")]
    Server {
        /// HTTP status.
        status: u16,
    },

    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Any other non-success status.
    #[error("unexpected response status {status}")]
    Unexpected {
        /// HTTP status.
        status: u16,
    },

    /// The synchronizer has not been started.
    #[error("synchronizer not started")]
    NotStarted,

    /// The session store failed.
    #[error("session store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Returns true for failures worth a manual retry: server errors,
    /// network failures and malformed responses.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Server { .. } | SyncError::Transport(_) | SyncError::Protocol(_)
        )
    }
}

impl From<ContentError> for SyncError {
    fn from(err: ContentError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::Store(err.to_string())
    }
}
