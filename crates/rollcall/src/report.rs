//! Attendance reports.
//!
//! The instructor's view of a session: one row per student who submitted at
//! least once, with the verdict and how many tokens backed it.

use chrono::{DateTime, Utc};
use rollcall_model::{AttendanceStatus, Codec, SessionId, Store, StudentId};
use serde::{Deserialize, Serialize};

use crate::{Rollcall, RollcallError};

/// One row of an attendance report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: StudentId,
    /// `None` if the student record has since disappeared from the store.
    pub student_name: Option<String>,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    pub biometric_verified: bool,
    pub status: AttendanceStatus,
    /// Accepted token submissions.
    pub token_count: usize,
}

impl<S: Store> Rollcall<S> {
    /// Builds the attendance report for a session, ordered by check-in.
    ///
    /// # Errors
    /// [`RollcallError::SessionNotFound`]
    pub async fn attendance_report(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<AttendanceEntry>, RollcallError> {
        if self.store.session(session_id).await?.is_none() {
            return Err(RollcallError::SessionNotFound(session_id));
        }

        let records = self.store.records_for_session(session_id).await?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let student_name = self
                .store
                .student(record.student_id)
                .await?
                .map(|s| s.name);
            let token_count = self
                .store
                .submission_count(session_id, record.student_id)
                .await?;
            entries.push(AttendanceEntry {
                student_id: record.student_id,
                student_name,
                check_in: record.check_in,
                check_out: record.check_out,
                biometric_verified: record.biometric_verified,
                status: record.status,
                token_count,
            });
        }
        Ok(entries)
    }

    /// [`attendance_report`](Self::attendance_report), encoded with `codec`.
    pub async fn encode_report<C: Codec>(
        &self,
        session_id: SessionId,
        codec: &C,
    ) -> Result<Vec<u8>, RollcallError> {
        let entries = self.attendance_report(session_id).await?;
        Ok(codec.encode(&entries)?)
    }
}
