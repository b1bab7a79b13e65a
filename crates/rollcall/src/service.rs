//! `Rollcall` builder and facade.
//!
//! This is the entry point for embedding Rollcall. It ties the layers
//! together: store → token issuer/validator → rotation → ledger →
//! lifecycle, all sharing one clock and one set of session locks.

use std::sync::Arc;

use rollcall_ledger::{
    AttendanceLedger, BiometricVerifier, LedgerReceipt, ReferenceVerifier, TokenSubmission,
};
use rollcall_model::{
    AttendanceRecord, Clock, OwnerId, Session, SessionId, SessionLocks, SessionMetadata, Store,
    StudentId, SystemClock, Token,
};
use rollcall_rotation::RotationScheduler;
use rollcall_token::{EntropySource, OsEntropy, TokenIssuer};
use tracing::debug;

use crate::{RollcallConfig, RollcallError, SessionLifecycle};

/// Builder for a [`Rollcall`] instance.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rollcall::prelude::*;
///
/// # async fn demo() -> Result<(), RollcallError> {
/// let rollcall = RollcallBuilder::new()
///     .config(RollcallConfig::from_env())
///     .build(Arc::new(MemoryStore::new()));
///
/// let session = rollcall
///     .open(OwnerId(1), SessionMetadata::default())
///     .await?;
/// let token = rollcall.current_token(session.id).await?;
/// println!("broadcast {}", token.value);
/// # Ok(())
/// # }
/// ```
pub struct RollcallBuilder {
    config: RollcallConfig,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    verifier: Arc<dyn BiometricVerifier>,
}

impl RollcallBuilder {
    /// Creates a builder with default config, the system clock, the OS
    /// random source, and [`ReferenceVerifier`].
    pub fn new() -> Self {
        Self {
            config: RollcallConfig::default(),
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            verifier: Arc::new(ReferenceVerifier),
        }
    }

    pub fn config(mut self, config: RollcallConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn BiometricVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Wires every component over `store`. The config is validated here.
    pub fn build<S: Store>(self, store: Arc<S>) -> Rollcall<S> {
        let config = self.config.validated();
        let locks = Arc::new(SessionLocks::new());

        let issuer = Arc::new(
            TokenIssuer::new(Arc::clone(&store), Arc::clone(&locks), config.tokens.clone())
                .with_clock(Arc::clone(&self.clock))
                .with_entropy(self.entropy),
        );
        let scheduler = RotationScheduler::new(Arc::clone(&issuer));
        let ledger = Arc::new(
            AttendanceLedger::new(
                Arc::clone(&store),
                Arc::clone(&locks),
                &config.tokens,
                config.policy,
            )
            .with_clock(Arc::clone(&self.clock))
            .with_verifier(self.verifier),
        );
        let lifecycle = SessionLifecycle::new(
            Arc::clone(&store),
            locks,
            self.clock,
            scheduler,
            Arc::clone(&ledger),
            config.finalize_on_close,
        );

        debug!(?config, "rollcall built");
        Rollcall {
            store,
            issuer,
            ledger,
            lifecycle,
            config,
        }
    }
}

impl Default for RollcallBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired Rollcall instance.
///
/// The common operations are available directly; the components are
/// reachable through accessors for everything else.
pub struct Rollcall<S: Store> {
    pub(crate) store: Arc<S>,
    issuer: Arc<TokenIssuer<S>>,
    ledger: Arc<AttendanceLedger<S>>,
    lifecycle: SessionLifecycle<S>,
    config: RollcallConfig,
}

impl<S: Store> Rollcall<S> {
    pub fn config(&self) -> &RollcallConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn issuer(&self) -> &TokenIssuer<S> {
        &self.issuer
    }

    pub fn ledger(&self) -> &AttendanceLedger<S> {
        &self.ledger
    }

    pub fn lifecycle(&self) -> &SessionLifecycle<S> {
        &self.lifecycle
    }

    pub fn scheduler(&self) -> &RotationScheduler<S> {
        self.lifecycle.scheduler()
    }

    // -- Instructor side ---------------------------------------------------

    pub async fn open(
        &self,
        owner: OwnerId,
        metadata: SessionMetadata,
    ) -> Result<Session, RollcallError> {
        self.lifecycle.open(owner, metadata).await
    }

    pub async fn close(&self, session_id: SessionId) -> Result<Session, RollcallError> {
        self.lifecycle.close(session_id).await
    }

    pub async fn close_as(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<Session, RollcallError> {
        self.lifecycle.close_as(owner, session_id).await
    }

    pub async fn current_token(&self, session_id: SessionId) -> Result<Token, RollcallError> {
        Ok(self.issuer.current(session_id).await?)
    }

    pub async fn current_token_as(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<Token, RollcallError> {
        self.lifecycle.current_token_as(owner, session_id).await
    }

    /// Finalizes every record of a closed session.
    pub async fn finalize_closed_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, RollcallError> {
        Ok(self.ledger.finalize_closed_session(session_id).await?)
    }

    // -- Student side ------------------------------------------------------

    pub async fn submit(
        &self,
        submission: TokenSubmission,
    ) -> Result<LedgerReceipt, RollcallError> {
        Ok(self.ledger.record_submission(submission).await?)
    }

    pub async fn check_out(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        payload: &str,
    ) -> Result<LedgerReceipt, RollcallError> {
        Ok(self
            .ledger
            .verify_and_finalize(session_id, student_id, payload)
            .await?)
    }

    /// Stops every rotation job.
    pub async fn shutdown(&self) {
        self.scheduler().shutdown().await;
    }
}
