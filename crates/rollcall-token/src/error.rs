//! Error types for the token layer.

use rollcall_model::{ErrorKind, SessionId, StoreError};

/// Errors that can occur while issuing or validating tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No session exists with this id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The session is closed (or absent) and cannot receive new tokens.
    #[error("session {0} is not active")]
    SessionNotActive(SessionId),

    /// The submitted value matches no token that was live at the
    /// submission time, even allowing for the grace window.
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    /// The random source failed.
    #[error("entropy source failed: {0}")]
    Entropy(String),

    /// Token expiry would overflow the timestamp range.
    #[error("token expiry out of range")]
    ExpiryOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) => ErrorKind::NotFound,
            Self::SessionNotActive(_) => ErrorKind::InvalidState,
            Self::InvalidOrExpiredToken => ErrorKind::ValidationFailed,
            Self::Entropy(_) | Self::ExpiryOutOfRange => ErrorKind::Internal,
            Self::Store(e) => e.kind(),
        }
    }
}
