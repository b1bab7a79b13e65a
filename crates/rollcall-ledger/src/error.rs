use rollcall_model::{ErrorKind, SessionId, StoreError, StudentId};
use rollcall_token::TokenError;

/// Errors that can occur in attendance operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("no attendance record for student {student} in session {session}")]
    RecordNotFound {
        session: SessionId,
        student: StudentId,
    },

    #[error("student {0} not found")]
    StudentNotFound(StudentId),

    /// Close-time finalization was requested for a session still running.
    #[error("session {0} is still active")]
    SessionStillActive(SessionId),

    /// The submitted token was rejected, or issuance-side state was missing.
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) | Self::RecordNotFound { .. } | Self::StudentNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::SessionStillActive(_) => ErrorKind::InvalidState,
            Self::Token(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_token_is_validation_failure() {
        let err = LedgerError::from(TokenError::InvalidOrExpiredToken);
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.to_string(), "invalid or expired token");
    }

    #[test]
    fn test_record_not_found_display() {
        let session = SessionId::generate();
        let err = LedgerError::RecordNotFound {
            session,
            student: StudentId(7),
        };
        assert_eq!(
            err.to_string(),
            format!("no attendance record for student S-7 in session {session}")
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
