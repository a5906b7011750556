//! Error type shared by the collaboration layer.
//!
//! Most outcomes in this crate are policy, not failure: stale presence
//! updates are dropped, reentrant calls fall back, and offline field writes
//! are no-ops. The variants below cover what a caller can actually act on.

use thiserror::Error;

/// Errors surfaced by the collaboration layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollabError {
    /// Binary payload could not be decoded (yrs update or awareness batch).
    #[error("decode error: {0}")]
    Decode(String),

    /// Payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// A decoded yrs update was rejected by the document.
    #[error("update rejected: {0}")]
    Update(String),

    /// Cursor placement target does not exist in the current buffer.
    #[error("position {row}:{column} is outside the buffer")]
    InvalidPosition { row: usize, column: usize },

    /// Scroll target row does not exist in the current buffer.
    #[error("scroll row {0} is outside the buffer")]
    InvalidScroll(usize),

    /// Options document could not be parsed.
    #[error("invalid options: {0}")]
    Config(String),
}

impl From<yrs::encoding::read::Error> for CollabError {
    fn from(e: yrs::encoding::read::Error) -> Self {
        CollabError::Decode(e.to_string())
    }
}

impl From<serde_json::Error> for CollabError {
    fn from(e: serde_json::Error) -> Self {
        CollabError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CollabError>;
