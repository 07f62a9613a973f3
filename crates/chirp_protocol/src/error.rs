//! Error types for protocol encoding and decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// The bytes did not contain a well-formed message of the expected shape.
    #[error("failed to decode message: {0}")]
    Decode(String),
}
