//! The token issuer: mints tokens and retires their predecessors.
//!
//! # Concurrency note
//!
//! Issuance runs under the session-scoped lock from [`SessionLocks`], so a
//! rotation tick and an instructor's "current token" poll can't both decide the
//! session has no active token and mint two. The deactivate-and-insert pair
//! itself is one [`Store::rotate_token`] call.

use std::sync::Arc;

use rollcall_model::{Clock, NewToken, SessionId, SessionLocks, Store, StoreError, SystemClock, Token};
use tracing::{debug, info};

use crate::{EntropySource, OsEntropy, TokenConfig, TokenError, encode_token};

/// Issues rotating tokens for active sessions.
///
/// ## Lifecycle of one token
///
/// ```text
/// issue() ──→ [active, live] ──(next issue / close)──→ [inactive]
///                  │
///                  ▼ (expires_at passes)
///             [active, expired] ── still accepted for grace_period
/// ```
pub struct TokenIssuer<S: Store> {
    store: Arc<S>,
    locks: Arc<SessionLocks>,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    config: TokenConfig,
}

impl<S: Store> TokenIssuer<S> {
    /// Creates an issuer using the system clock and the OS random source.
    pub fn new(store: Arc<S>, locks: Arc<SessionLocks>, config: TokenConfig) -> Self {
        Self {
            store,
            locks,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            config: config.validated(),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the random source.
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Mints a new token for `session_id` and deactivates the previous one.
    ///
    /// After this returns `Ok`, exactly one token is active for the
    /// session. On any error nothing changed.
    ///
    /// # Errors
    /// - [`TokenError::SessionNotActive`]: session closed or absent
    /// - [`TokenError::Entropy`] / [`TokenError::Store`]: internal failure
    pub async fn issue(&self, session_id: SessionId) -> Result<Token, TokenError> {
        let _guard = self.locks.lock_session(session_id).await;
        self.issue_locked(session_id).await
    }

    /// [`issue`](Self::issue), except `proceed` is asked once the session
    /// lock is held. If it returns `false` nothing is issued and the result
    /// is `Ok(None)`.
    ///
    /// Rotation ticks use this so a job stopped while its tick waited on
    /// the lock does not mint one last token.
    pub async fn issue_if<F>(
        &self,
        session_id: SessionId,
        proceed: F,
    ) -> Result<Option<Token>, TokenError>
    where
        F: FnOnce() -> bool + Send,
    {
        let _guard = self.locks.lock_session(session_id).await;
        if !proceed() {
            return Ok(None);
        }
        self.issue_locked(session_id).await.map(Some)
    }

    /// The token an instructor's device should be broadcasting right now.
    ///
    /// Returns the active token for as long as the validator would still
    /// accept it, i.e. through its grace period. Rotation ticks land a
    /// moment after each expiry; a poll in that gap gets the outgoing token
    /// rather than minting one the tick replaces straight away. A fresh
    /// token is issued only when there is none, or when the active one is
    /// past its grace period because nothing rotated it.
    ///
    /// # Errors
    /// Same as [`issue`](Self::issue) when a new token is needed.
    pub async fn current(&self, session_id: SessionId) -> Result<Token, TokenError> {
        let _guard = self.locks.lock_session(session_id).await;
        if let Some(token) = self.store.active_token(session_id).await? {
            let now = self.clock.now();
            if token.covers(now) || token.expired_within(now, self.config.grace_delta()) {
                return Ok(token);
            }
            debug!(%session_id, token_id = %token.id, "active token past grace, reissuing");
        }
        self.issue_locked(session_id).await
    }

    /// The active token, if any, without issuing.
    pub async fn active(&self, session_id: SessionId) -> Result<Option<Token>, TokenError> {
        Ok(self.store.active_token(session_id).await?)
    }

    /// Issue body. Caller must hold the session lock.
    async fn issue_locked(&self, session_id: SessionId) -> Result<Token, TokenError> {
        match self.store.session(session_id).await? {
            Some(session) if session.is_active() => {}
            _ => return Err(TokenError::SessionNotActive(session_id)),
        }

        let value = self.generate_value()?;
        let created_at = self.clock.now();
        let expires_at = created_at
            .checked_add_signed(self.config.rotation_delta())
            .ok_or(TokenError::ExpiryOutOfRange)?;

        let rotation = self
            .store
            .rotate_token(NewToken {
                session_id,
                value,
                created_at,
                expires_at,
            })
            .await
            .map_err(|e| match e {
                StoreError::SessionNotFound(id) | StoreError::SessionClosed(id) => {
                    TokenError::SessionNotActive(id)
                }
                other => TokenError::Store(other),
            })?;

        info!(
            %session_id,
            token_id = %rotation.token.id,
            deactivated = rotation.deactivated.len(),
            expires_at = %rotation.token.expires_at,
            "token issued"
        );
        Ok(rotation.token)
    }

    fn generate_value(&self) -> Result<String, TokenError> {
        let mut bytes = vec![0u8; self.config.token_bytes];
        self.entropy.fill(&mut bytes)?;
        Ok(encode_token(&bytes))
    }
}

// =========================================================================
// Tests
// =========================================================================
