//! Error types for the reference server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request conflicts with existing data.
    #[error("{0}")]
    Conflict(String),

    /// Missing, invalid or expired credentials.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Authenticated, but not allowed to touch this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No such resource or route.
    #[error("not found: {0}")]
    NotFound(String),

    /// Injected or internal failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// Failure forced with a specific status (fault injection).
    #[error("injected failure (status {0})")]
    Injected(u16),
}

impl ServerError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Conflict(_) => 400,
            ServerError::NotAuthorized(_) => 401,
            ServerError::Forbidden(_) => 403,
            ServerError::NotFound(_) => 404,
            ServerError::Internal(_) => 500,
            ServerError::Injected(status) => *status,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status())
    }
}
