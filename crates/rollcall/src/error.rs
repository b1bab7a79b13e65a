//! Unified error type for Rollcall.

use rollcall_ledger::LedgerError;
use rollcall_model::{CodecError, ErrorKind, OwnerId, SessionId, StoreError};
use rollcall_rotation::RotationError;
use rollcall_token::TokenError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` variants let `?` convert layer errors automatically.
/// Use [`kind`](Self::kind) to map any of them to a response without
/// matching on each variant.
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// Closing a session that is already closed.
    #[error("session {0} is already closed")]
    SessionClosed(SessionId),

    /// The caller does not own the session it is acting on.
    #[error("{owner} does not own session {session}")]
    NotOwner { session: SessionId, owner: OwnerId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl RollcallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) => ErrorKind::NotFound,
            Self::SessionClosed(_) => ErrorKind::InvalidState,
            Self::NotOwner { .. } => ErrorKind::ValidationFailed,
            Self::Store(e) => e.kind(),
            Self::Token(e) => e.kind(),
            Self::Rotation(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
            Self::Codec(e) => e.kind(),
        }
    }
}
