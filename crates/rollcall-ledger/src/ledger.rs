//! The attendance ledger.
//!
//! # Locking
//!
//! Every write holds the `(session, student)` lock, so two submissions
//! from one student can't both create a record. Writes that finalize also
//! hold the session lock, taken after the student lock, so they serialize
//! with session close. Each write lands in the store as a single
//! [`Store::save_record`] call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rollcall_model::{
    AttendanceRecord, Clock, Session, SessionId, SessionLocks, Store, StudentId, Submission,
    SystemClock,
};
use rollcall_token::{TokenConfig, TokenValidator};
use tracing::{debug, info};

use crate::{AttendancePolicy, BiometricVerifier, LedgerError, ReferenceVerifier};

pub const SUBMISSION_RECORDED: &str = "Token submission recorded";
pub const BIOMETRIC_COMPLETED: &str = "Biometric verification completed";

/// A student's token submission as it arrives from their device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubmission {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub token_value: String,
    /// When the device captured the token. Validation is against this, not
    /// against arrival time.
    pub submitted_at: DateTime<Utc>,
    /// Received signal strength (RSSI), if the device reported it.
    pub signal: Option<i32>,
    /// Check-out payload. Present on the last submission of a class.
    pub biometric: Option<String>,
}

/// What a successful ledger write returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub record: AttendanceRecord,
    /// Submissions on the record after this write.
    pub submission_count: usize,
    pub message: &'static str,
}

/// Records submissions and derives attendance verdicts.
///
/// The ledger is the only writer of `AttendanceRecord::status`.
pub struct AttendanceLedger<S: Store> {
    store: Arc<S>,
    validator: TokenValidator<S>,
    locks: Arc<SessionLocks>,
    clock: Arc<dyn Clock>,
    verifier: Arc<dyn BiometricVerifier>,
    policy: AttendancePolicy,
    interval: Duration,
}

impl<S: Store> AttendanceLedger<S> {
    /// Creates a ledger with the system clock and [`ReferenceVerifier`].
    ///
    /// `tokens` must be the same config the issuer runs with: its grace
    /// period drives validation and its rotation interval drives the
    /// expected submission count.
    pub fn new(
        store: Arc<S>,
        locks: Arc<SessionLocks>,
        tokens: &TokenConfig,
        policy: AttendancePolicy,
    ) -> Self {
        Self {
            validator: TokenValidator::new(Arc::clone(&store), tokens),
            store,
            locks,
            clock: Arc::new(SystemClock),
            verifier: Arc::new(ReferenceVerifier),
            policy: policy.validated(),
            interval: tokens.rotation_interval,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn BiometricVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn policy(&self) -> &AttendancePolicy {
        &self.policy
    }

    /// Validates a submitted token and appends it to the student's record,
    /// creating the record on first contact.
    ///
    /// With a biometric payload the record is also checked out: verified
    /// flag and check-out time are set, and if the session has already
    /// closed the record is finalized.
    ///
    /// # Errors
    /// - [`LedgerError::SessionNotFound`]
    /// - [`LedgerError::Token`] with the validator's rejection
    /// - [`LedgerError::StudentNotFound`] when a biometric payload is given
    ///   for an unknown student
    /// - [`LedgerError::Store`] on storage failure; nothing was written
    pub async fn record_submission(
        &self,
        submission: TokenSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        let TokenSubmission {
            session_id,
            student_id,
            token_value,
            submitted_at,
            signal,
            biometric,
        } = submission;

        let _student_guard = self.locks.lock_student(session_id, student_id).await;
        let _session_guard = if biometric.is_some() {
            Some(self.locks.lock_session(session_id).await)
        } else {
            None
        };

        let session = self.load_session(session_id).await?;
        let validation = self
            .validator
            .validate(session_id, &token_value, submitted_at)
            .await?;

        let mut record = match self.store.record(session_id, student_id).await? {
            // Devices can deliver out of order; check-in is the earliest capture.
            Some(mut record) => {
                record.check_in = record.check_in.min(submitted_at);
                record
            }
            None => AttendanceRecord::new(session_id, student_id, submitted_at),
        };
        let submission_count = self.store.submission_count(session_id, student_id).await? + 1;

        let mut finalized = false;
        if let Some(payload) = biometric.as_deref() {
            record.biometric_verified = self.verify(student_id, payload).await?;
            record.check_out = Some(submitted_at);
            if !session.is_active() {
                record = self
                    .policy
                    .finalize(record, &session, submission_count, self.interval);
                finalized = true;
            }
        }

        let record = self
            .store
            .save_record(
                record,
                Some(Submission {
                    token_id: validation.token.id,
                    session_id,
                    student_id,
                    submitted_at,
                    signal,
                }),
            )
            .await?;

        info!(
            %session_id,
            %student_id,
            token_id = %validation.token.id,
            reason = validation.reason(),
            submission_count,
            "submission recorded"
        );
        if finalized {
            info!(%session_id, %student_id, status = %record.status, "attendance finalized");
        }

        Ok(LedgerReceipt {
            record,
            submission_count,
            message: SUBMISSION_RECORDED,
        })
    }

    /// Biometric check-out: verifies the payload, stamps check-out with the
    /// current time, and always finalizes.
    ///
    /// # Errors
    /// - [`LedgerError::SessionNotFound`]
    /// - [`LedgerError::RecordNotFound`] if the student never submitted
    /// - [`LedgerError::StudentNotFound`]
    pub async fn verify_and_finalize(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        payload: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        let _student_guard = self.locks.lock_student(session_id, student_id).await;
        let _session_guard = self.locks.lock_session(session_id).await;

        let session = self.load_session(session_id).await?;
        let mut record = self
            .store
            .record(session_id, student_id)
            .await?
            .ok_or(LedgerError::RecordNotFound {
                session: session_id,
                student: student_id,
            })?;

        record.biometric_verified = self.verify(student_id, payload).await?;
        record.check_out = Some(self.clock.now());

        let (record, submission_count) = self.finalize_and_save(record, &session).await?;
        info!(
            %session_id,
            %student_id,
            verified = record.biometric_verified,
            status = %record.status,
            "biometric check-out finalized"
        );

        Ok(LedgerReceipt {
            record,
            submission_count,
            message: BIOMETRIC_COMPLETED,
        })
    }

    /// Finalizes every record of a closed session.
    ///
    /// Records without a verified check-out end up absent. Already final
    /// records are recomputed, which gives the same verdict for the same
    /// inputs.
    ///
    /// # Errors
    /// - [`LedgerError::SessionNotFound`]
    /// - [`LedgerError::SessionStillActive`]
    pub async fn finalize_closed_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let session = self.load_session(session_id).await?;
        if session.is_active() {
            return Err(LedgerError::SessionStillActive(session_id));
        }

        let students: Vec<StudentId> = self
            .store
            .records_for_session(session_id)
            .await?
            .into_iter()
            .map(|r| r.student_id)
            .collect();

        let mut finalized = Vec::with_capacity(students.len());
        for student_id in students {
            // Student before session, one record at a time.
            let _student_guard = self.locks.lock_student(session_id, student_id).await;
            let _session_guard = self.locks.lock_session(session_id).await;

            let Some(record) = self.store.record(session_id, student_id).await? else {
                continue;
            };
            let (record, _) = self.finalize_and_save(record, &session).await?;
            debug!(%session_id, %student_id, status = %record.status, "record finalized");
            finalized.push(record);
        }

        info!(%session_id, records = finalized.len(), "closed session finalized");
        Ok(finalized)
    }

    // -- Read queries ------------------------------------------------------

    pub async fn record(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<Option<AttendanceRecord>, LedgerError> {
        Ok(self.store.record(session_id, student_id).await?)
    }

    pub async fn records_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        Ok(self.store.records_for_session(session_id).await?)
    }

    pub async fn records_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AttendanceRecord>, LedgerError> {
        Ok(self.store.records_for_student(student_id).await?)
    }

    pub async fn submission_count(
        &self,
        session_id: SessionId,
        student_id: StudentId,
    ) -> Result<usize, LedgerError> {
        Ok(self.store.submission_count(session_id, student_id).await?)
    }

    // -- Internals ---------------------------------------------------------

    async fn load_session(&self, session_id: SessionId) -> Result<Session, LedgerError> {
        self.store
            .session(session_id)
            .await?
            .ok_or(LedgerError::SessionNotFound(session_id))
    }

    async fn verify(&self, student_id: StudentId, payload: &str) -> Result<bool, LedgerError> {
        let student = self
            .store
            .student(student_id)
            .await?
            .ok_or(LedgerError::StudentNotFound(student_id))?;
        Ok(self
            .verifier
            .verify(payload, student.biometric_reference.as_deref()))
    }

    /// Caller holds both the student and session locks.
    async fn finalize_and_save(
        &self,
        record: AttendanceRecord,
        session: &Session,
    ) -> Result<(AttendanceRecord, usize), LedgerError> {
        let count = self
            .store
            .submission_count(record.session_id, record.student_id)
            .await?;
        let record = self.policy.finalize(record, session, count, self.interval);
        let record = self.store.save_record(record, None).await?;
        Ok((record, count))
    }
}
