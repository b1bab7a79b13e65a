//! The persistence seam.
//!
//! Rollcall doesn't own a database. It defines [`Store`], and a deployment
//! plugs in whatever backs it (Postgres, SQLite, or the bundled
//! [`MemoryStore`](crate::MemoryStore)).
//!
//! Every method is one atomic operation with respect to visible state.
//! Multi-entity writes that must not be observed half-done
//! ([`rotate_token`](Store::rotate_token), [`close_session`](Store::close_session),
//! [`save_record`](Store::save_record)) are single methods for that reason.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
    AttendanceRecord, NewToken, OwnerId, Session, SessionId, Student, StudentId, StoreError,
    Submission, Token, TokenId,
};

/// Result of [`Store::rotate_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// The newly inserted, active token.
    pub token: Token,
    /// Tokens that were active before the call and are now inactive.
    pub deactivated: Vec<TokenId>,
}

/// Persistence for sessions, tokens, submissions, and attendance records.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` and `Send` futures: rotation jobs run on
/// spawned tasks and call into the store from any worker thread.
pub trait Store: Send + Sync + 'static {
    // -- Students --------------------------------------------------------

    fn insert_student(
        &self,
        student: Student,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn student(
        &self,
        id: StudentId,
    ) -> impl Future<Output = Result<Option<Student>, StoreError>> + Send;

    // -- Sessions --------------------------------------------------------

    /// Inserts a new session.
    ///
    /// # Errors
    /// [`StoreError::DuplicateSession`] if the id is taken.
    fn insert_session(
        &self,
        session: Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn session(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    fn sessions_for_owner(
        &self,
        owner: OwnerId,
    ) -> impl Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// Marks the session closed at `ended_at` and deactivates every token
    /// it owns, in one step.
    ///
    /// # Errors
    /// - [`StoreError::SessionNotFound`]
    /// - [`StoreError::SessionClosed`] if it was already closed
    fn close_session(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Session, StoreError>> + Send;

    // -- Tokens ----------------------------------------------------------

    /// Deactivates all active tokens of `token.session_id` and inserts
    /// `token` as the only active one, in one step.
    ///
    /// # Errors
    /// - [`StoreError::SessionNotFound`]
    /// - [`StoreError::SessionClosed`]
    fn rotate_token(
        &self,
        token: NewToken,
    ) -> impl Future<Output = Result<Rotation, StoreError>> + Send;

    fn active_token(
        &self,
        session: SessionId,
    ) -> impl Future<Output = Result<Option<Token>, StoreError>> + Send;

    /// All tokens ever issued for the session, oldest first.
    fn tokens(
        &self,
        session: SessionId,
    ) -> impl Future<Output = Result<Vec<Token>, StoreError>> + Send;

    /// Tokens of `session` whose value equals `value`, active or not.
    fn tokens_with_value(
        &self,
        session: SessionId,
        value: &str,
    ) -> impl Future<Output = Result<Vec<Token>, StoreError>> + Send;

    // -- Attendance ------------------------------------------------------

    fn record(
        &self,
        session: SessionId,
        student: StudentId,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>, StoreError>> + Send;

    /// Upserts `record` and, if given, appends `submission` to it, in one
    /// step. Returns the stored record.
    fn save_record(
        &self,
        record: AttendanceRecord,
        submission: Option<Submission>,
    ) -> impl Future<Output = Result<AttendanceRecord, StoreError>> + Send;

    fn records_for_session(
        &self,
        session: SessionId,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, StoreError>> + Send;

    fn records_for_student(
        &self,
        student: StudentId,
    ) -> impl Future<Output = Result<Vec<AttendanceRecord>, StoreError>> + Send;

    fn submission_count(
        &self,
        session: SessionId,
        student: StudentId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    fn submissions(
        &self,
        session: SessionId,
        student: StudentId,
    ) -> impl Future<Output = Result<Vec<Submission>, StoreError>> + Send;
}
