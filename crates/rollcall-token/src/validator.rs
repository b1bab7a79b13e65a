//! Token validation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rollcall_model::{SessionId, Store, Token};
use tracing::debug;

use crate::{TokenConfig, TokenError};

/// Why a submitted token was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Submitted while the token was live.
    Valid,
    /// Submitted after expiry, but within the grace window.
    GracePeriod,
}

/// An accepted submission: the token it matched and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub token: Token,
    pub acceptance: Acceptance,
}

impl Validation {
    pub fn reason(&self) -> &'static str {
        match self.acceptance {
            Acceptance::Valid => "Token valid",
            Acceptance::GracePeriod => "Token accepted (grace period)",
        }
    }
}

/// Checks submitted token values against a session's token history.
///
/// The active flag is not consulted. A token the issuer just replaced is
/// still accepted for submissions timestamped inside its window.
pub struct TokenValidator<S: Store> {
    store: Arc<S>,
    grace: chrono::Duration,
}

impl<S: Store> TokenValidator<S> {
    pub fn new(store: Arc<S>, config: &TokenConfig) -> Self {
        Self {
            store,
            grace: config.grace_delta(),
        }
    }

    /// Validates `value` as submitted for `session_id` at `submitted_at`.
    ///
    /// # Errors
    /// - [`TokenError::SessionNotFound`] if the session is unknown
    /// - [`TokenError::InvalidOrExpiredToken`] if no token of this session
    ///   with this value was live at `submitted_at` or within the grace
    ///   window before it
    pub async fn validate(
        &self,
        session_id: SessionId,
        value: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<Validation, TokenError> {
        if self.store.session(session_id).await?.is_none() {
            return Err(TokenError::SessionNotFound(session_id));
        }

        let candidates = self.store.tokens_with_value(session_id, value).await?;

        if let Some(token) = candidates.iter().find(|t| t.covers(submitted_at)) {
            return Ok(Validation {
                token: token.clone(),
                acceptance: Acceptance::Valid,
            });
        }

        if let Some(token) = candidates
            .iter()
            .find(|t| t.expired_within(submitted_at, self.grace))
        {
            debug!(%session_id, token_id = %token.id, "token accepted within grace period");
            return Ok(Validation {
                token: token.clone(),
                acceptance: Acceptance::GracePeriod,
            });
        }

        Err(TokenError::InvalidOrExpiredToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rollcall_model::{MemoryStore, NewToken, OwnerId, Session, SessionMetadata};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    async fn setup() -> (Arc<MemoryStore>, TokenValidator<MemoryStore>, SessionId) {
        let store = Arc::new(MemoryStore::new());
        let session = Session::open(OwnerId(1), SessionMetadata::default(), start());
        let id = session.id;
        store.insert_session(session).await.unwrap();
        store
            .rotate_token(NewToken {
                session_id: id,
                value: "abc".into(),
                created_at: start(),
                expires_at: start() + Duration::minutes(5),
            })
            .await
            .unwrap();
        let validator = TokenValidator::new(Arc::clone(&store), &TokenConfig::default());
        (store, validator, id)
    }

    #[tokio::test]
    async fn test_validate_inside_window_is_valid() {
        let (_, v, id) = setup().await;

        for offset in [Duration::zero(), Duration::minutes(2), Duration::minutes(5)] {
            let result = v.validate(id, "abc", start() + offset).await.unwrap();
            assert_eq!(result.acceptance, Acceptance::Valid);
            assert_eq!(result.reason(), "Token valid");
        }
    }

    #[tokio::test]
    async fn test_validate_90s_after_expiry_is_grace() {
        let (_, v, id) = setup().await;
        let at = start() + Duration::minutes(5) + Duration::seconds(90);

        let result = v.validate(id, "abc", at).await.unwrap();

        assert_eq!(result.acceptance, Acceptance::GracePeriod);
        assert_eq!(result.reason(), "Token accepted (grace period)");
    }

    #[tokio::test]
    async fn test_validate_grace_boundary_inclusive() {
        let (_, v, id) = setup().await;
        let at = start() + Duration::minutes(7);
        assert!(v.validate(id, "abc", at).await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_after_grace_rejected() {
        let (_, v, id) = setup().await;
        let at = start() + Duration::minutes(7) + Duration::seconds(1);

        let result = v.validate(id, "abc", at).await;

        assert!(matches!(result, Err(TokenError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_validate_before_creation_rejected() {
        let (_, v, id) = setup().await;
        let result = v.validate(id, "abc", start() - Duration::seconds(1)).await;
        assert!(matches!(result, Err(TokenError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_validate_wrong_value_rejected() {
        let (_, v, id) = setup().await;
        let result = v.validate(id, "xyz", start()).await;
        assert!(matches!(result, Err(TokenError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_validate_token_from_other_session_rejected() {
        let (store, v, _) = setup().await;
        let other = Session::open(OwnerId(2), SessionMetadata::default(), start());
        let other_id = other.id;
        store.insert_session(other).await.unwrap();

        let result = v.validate(other_id, "abc", start()).await;

        assert!(matches!(result, Err(TokenError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn test_validate_unknown_session_not_found() {
        let (_, v, _) = setup().await;
        let result = v.validate(SessionId::generate(), "abc", start()).await;
        assert!(matches!(result, Err(TokenError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_validate_ignores_active_flag() {
        let (store, v, id) = setup().await;
        store
            .rotate_token(NewToken {
                session_id: id,
                value: "def".into(),
                created_at: start() + Duration::minutes(5),
                expires_at: start() + Duration::minutes(10),
            })
            .await
            .unwrap();

        // "abc" is now inactive but the submission was inside its window.
        let result = v.validate(id, "abc", start() + Duration::minutes(4)).await.unwrap();
        assert_eq!(result.acceptance, Acceptance::Valid);
    }
}
