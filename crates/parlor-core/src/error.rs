//! Error types returned by room operations.

use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by participant and message operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or malformed input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A participant with this name is already in the room.
    #[error("Participant already exists: {0}")]
    Conflict(String),

    /// Unknown participant.
    #[error("Participant not found: {0}")]
    NotFound(String),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChatError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation",
            ChatError::Conflict(_) => "conflict",
            ChatError::NotFound(_) => "not_found",
            ChatError::Store(_) => "store",
        }
    }
}
