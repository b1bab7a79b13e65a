//! Error types for the model layer.
//!
//! Every crate in Rollcall defines its own error enum, and every enum can
//! report an [`ErrorKind`] so callers (an HTTP layer, a CLI) can map
//! failures to responses without matching on each variant.

use crate::SessionId;

/// Caller-facing classification shared by all Rollcall errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A session, record, student, or token does not exist.
    NotFound,
    /// The target exists but is in the wrong state for the operation.
    InvalidState,
    /// The caller's input was checked and rejected (bad token, biometric mismatch).
    ValidationFailed,
    /// Storage or entropy failure. Nothing was mutated.
    Internal,
}

/// Errors raised by a [`Store`](crate::Store) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced session does not exist.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// A session with this id was already inserted.
    #[error("session {0} already exists")]
    DuplicateSession(SessionId),

    /// The session is closed and no longer takes new tokens.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    /// The backing store could not complete the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateSession(_) | Self::SessionClosed(_) => ErrorKind::InvalidState,
            Self::Unavailable(_) => ErrorKind::Internal,
        }
    }
}

/// Errors from encoding or decoding reports.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}
