//! Post content validation.

use thiserror::Error;

/// Maximum post length, in Unicode scalar values.
pub const MAX_POST_CHARS: usize = 280;

/// Why a post body was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// Empty or whitespace-only content.
    #[error("post content is empty")]
    Empty,

    /// Content longer than [`MAX_POST_CHARS`].
    #[error("post content is {len} characters, the limit is {max}")]
    TooLong {
        /// Actual length in characters.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },
}

/// Checks that `content` can be published.
///
/// Length is counted in characters, not bytes, so multi-byte text gets the
/// same budget as ASCII.
pub fn validate_content(content: &str) -> Result<(), ContentError> {
    if content.trim().is_empty() {
        return Err(ContentError::Empty);
    }
    let len = content.chars().count();
    if len > MAX_POST_CHARS {
        return Err(ContentError::TooLong {
            len,
            max: MAX_POST_CHARS,
        });
    }
    Ok(())
}
