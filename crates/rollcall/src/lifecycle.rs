//! Session open/close transitions.
//!
//! Opening a session starts its rotation job; closing it stops the job,
//! stamps the end time, and retires every token in one store call.
//!
//! # Lock order
//!
//! `close` stops the scheduler *before* taking the session lock, so no
//! rotation tick is left to wait on a session that is going away. A tick
//! already parked on the lock sees its cancellation and issues nothing.

use std::sync::Arc;

use rollcall_ledger::AttendanceLedger;
use rollcall_model::{
    Clock, OwnerId, Session, SessionId, SessionLocks, SessionMetadata, Store, StoreError, Token,
};
use rollcall_rotation::RotationScheduler;
use tracing::{info, warn};

use crate::RollcallError;

/// Owns session state transitions and drives the rotation scheduler.
pub struct SessionLifecycle<S: Store> {
    store: Arc<S>,
    locks: Arc<SessionLocks>,
    clock: Arc<dyn Clock>,
    scheduler: RotationScheduler<S>,
    ledger: Arc<AttendanceLedger<S>>,
    finalize_on_close: bool,
}

impl<S: Store> SessionLifecycle<S> {
    pub fn new(
        store: Arc<S>,
        locks: Arc<SessionLocks>,
        clock: Arc<dyn Clock>,
        scheduler: RotationScheduler<S>,
        ledger: Arc<AttendanceLedger<S>>,
        finalize_on_close: bool,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            scheduler,
            ledger,
            finalize_on_close,
        }
    }

    pub fn scheduler(&self) -> &RotationScheduler<S> {
        &self.scheduler
    }

    /// Opens a session for `owner` and starts rotating its token.
    ///
    /// The first token exists by the time this returns. If it can't be
    /// issued, the session is closed again and the error returned.
    pub async fn open(
        &self,
        owner: OwnerId,
        metadata: SessionMetadata,
    ) -> Result<Session, RollcallError> {
        let session = Session::open(owner, metadata, self.clock.now());
        let session_id = session.id;
        self.store.insert_session(session.clone()).await?;

        if let Err(e) = self.scheduler.start(session_id).await {
            warn!(%session_id, error = %e, "initial token issuance failed, closing session");
            if let Err(close_err) = self.store.close_session(session_id, self.clock.now()).await {
                warn!(%session_id, error = %close_err, "could not close session after failed start");
            }
            return Err(e.into());
        }

        info!(
            %session_id,
            %owner,
            course = %session.metadata.course_name,
            "session opened"
        );
        Ok(session)
    }

    /// Closes a session: stops rotation, sets the end time, deactivates
    /// all of its tokens.
    ///
    /// With `finalize_on_close` every record is finalized afterwards. If
    /// that step fails the session is still closed; retry with
    /// `AttendanceLedger::finalize_closed_session`.
    ///
    /// # Errors
    /// - [`RollcallError::SessionNotFound`]
    /// - [`RollcallError::SessionClosed`] if it was already closed
    pub async fn close(&self, session_id: SessionId) -> Result<Session, RollcallError> {
        let session = self.session(session_id).await?;
        if !session.is_active() {
            return Err(RollcallError::SessionClosed(session_id));
        }

        self.scheduler.stop(session_id).await;

        let closed = {
            let _guard = self.locks.lock_session(session_id).await;
            self.store
                .close_session(session_id, self.clock.now())
                .await
                .map_err(|e| match e {
                    StoreError::SessionNotFound(id) => RollcallError::SessionNotFound(id),
                    StoreError::SessionClosed(id) => RollcallError::SessionClosed(id),
                    other => other.into(),
                })?
        };
        self.scheduler.release(session_id).await;
        info!(%session_id, ended_at = ?closed.ended_at, "session closed");

        if self.finalize_on_close {
            self.ledger.finalize_closed_session(session_id).await?;
        }
        Ok(closed)
    }

    /// [`close`](Self::close), only if `owner` owns the session.
    pub async fn close_as(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<Session, RollcallError> {
        self.owned_session(owner, session_id).await?;
        self.close(session_id).await
    }

    /// The token the owner's device should be broadcasting. Issues one if
    /// the session has no live token.
    pub async fn current_token_as(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<Token, RollcallError> {
        self.owned_session(owner, session_id).await?;
        Ok(self.scheduler.issuer().current(session_id).await?)
    }

    pub async fn session(&self, session_id: SessionId) -> Result<Session, RollcallError> {
        self.store
            .session(session_id)
            .await?
            .ok_or(RollcallError::SessionNotFound(session_id))
    }

    /// Sessions owned by `owner`, oldest first.
    pub async fn sessions_for_owner(&self, owner: OwnerId) -> Result<Vec<Session>, RollcallError> {
        Ok(self.store.sessions_for_owner(owner).await?)
    }

    async fn owned_session(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<Session, RollcallError> {
        let session = self.session(session_id).await?;
        if session.owner != owner {
            return Err(RollcallError::NotOwner {
                session: session_id,
                owner,
            });
        }
        Ok(session)
    }
}
