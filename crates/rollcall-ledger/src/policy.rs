//! The attendance verdict.
//!
//! One pure function decides every final status. Both the biometric
//! check-out path and close-time finalization go through
//! [`AttendancePolicy::finalize`].

use std::time::Duration;

use rollcall_model::{AttendanceRecord, AttendanceStatus, Session};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Thresholds for turning a submission count into a verdict.
///
/// | verified | submissions            | status  |
/// |----------|------------------------|---------|
/// | no       | any                    | absent  |
/// | yes      | ≥ present × expected   | present |
/// | yes      | ≥ partial × expected   | partial |
/// | yes      | fewer                  | absent  |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendancePolicy {
    /// Fraction of expected submissions needed for `present`. Default: 0.8.
    pub present_threshold: f64,
    /// Fraction of expected submissions needed for `partial`. Default: 0.5.
    pub partial_threshold: f64,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            present_threshold: 0.8,
            partial_threshold: 0.5,
        }
    }
}

impl AttendancePolicy {
    /// Clamp thresholds into `0.0..=1.0` and force `partial ≤ present`.
    ///
    /// A NaN threshold falls back to its default.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        self.present_threshold = clamp_fraction(
            "present_threshold",
            self.present_threshold,
            defaults.present_threshold,
        );
        self.partial_threshold = clamp_fraction(
            "partial_threshold",
            self.partial_threshold,
            defaults.partial_threshold,
        );
        if self.partial_threshold > self.present_threshold {
            warn!(
                partial = self.partial_threshold,
                present = self.present_threshold,
                "partial_threshold above present_threshold, lowering"
            );
            self.partial_threshold = self.present_threshold;
        }
        self
    }

    /// How many submissions a fully present student would have made.
    ///
    /// `floor(duration / interval)`, at least 1. While the session is still
    /// open there is no duration yet, so the answer is 1.
    pub fn expected_submissions(&self, session: &Session, interval: Duration) -> u64 {
        let Some(duration) = session.duration() else {
            return 1;
        };
        let duration_ms = u128::try_from(duration.num_milliseconds()).unwrap_or(0);
        let interval_ms = interval.as_millis();
        if interval_ms == 0 {
            return 1;
        }
        u64::try_from(duration_ms / interval_ms)
            .unwrap_or(u64::MAX)
            .max(1)
    }

    /// The verdict for `submissions` out of `expected`.
    pub fn derive_status(&self, submissions: usize, expected: u64, verified: bool) -> AttendanceStatus {
        if !verified {
            return AttendanceStatus::Absent;
        }
        let count = submissions as f64;
        let expected = expected as f64;
        if count >= expected * self.present_threshold {
            AttendanceStatus::Present
        } else if count >= expected * self.partial_threshold {
            AttendanceStatus::Partial
        } else {
            AttendanceStatus::Absent
        }
    }

    /// Sets `record.status` from its verified flag and submission count.
    pub fn finalize(
        &self,
        mut record: AttendanceRecord,
        session: &Session,
        submissions: usize,
        interval: Duration,
    ) -> AttendanceRecord {
        let expected = self.expected_submissions(session, interval);
        record.status = self.derive_status(submissions, expected, record.biometric_verified);
        record
    }
}

fn clamp_fraction(name: &str, value: f64, default: f64) -> f64 {
    if value.is_nan() {
        warn!(threshold = name, default, "threshold is NaN, using default");
        return default;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        warn!(threshold = name, requested = value, clamped, "threshold out of range, clamping");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rollcall_model::{OwnerId, SessionMetadata, StudentId};

    const FIVE_MIN: Duration = Duration::from_secs(300);

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn ended_after(minutes: i64) -> Session {
        let mut session = Session::open(OwnerId(1), SessionMetadata::default(), start());
        session.active = false;
        session.ended_at = Some(start() + chrono::Duration::minutes(minutes));
        session
    }

    fn verified_record(session: &Session) -> AttendanceRecord {
        let mut record = AttendanceRecord::new(session.id, StudentId(1), start());
        record.biometric_verified = true;
        record
    }

    #[test]
    fn test_expected_submissions_50_min_at_5_min_is_10() {
        let policy = AttendancePolicy::default();
        assert_eq!(policy.expected_submissions(&ended_after(50), FIVE_MIN), 10);
    }

    #[test]
    fn test_expected_submissions_floors() {
        let policy = AttendancePolicy::default();
        assert_eq!(policy.expected_submissions(&ended_after(54), FIVE_MIN), 10);
    }

    #[test]
    fn test_expected_submissions_minimum_one() {
        let policy = AttendancePolicy::default();
        assert_eq!(policy.expected_submissions(&ended_after(3), FIVE_MIN), 1);
        assert_eq!(policy.expected_submissions(&ended_after(0), FIVE_MIN), 1);
    }

    #[test]
    fn test_expected_submissions_open_session_is_one() {
        let policy = AttendancePolicy::default();
        let open = Session::open(OwnerId(1), SessionMetadata::default(), start());
        assert_eq!(policy.expected_submissions(&open, FIVE_MIN), 1);
    }

    #[test]
    fn test_finalize_nine_of_ten_verified_is_present() {
        let policy = AttendancePolicy::default();
        let session = ended_after(50);
        let record = policy.finalize(verified_record(&session), &session, 9, FIVE_MIN);
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[test]
    fn test_finalize_six_of_ten_verified_is_partial() {
        let policy = AttendancePolicy::default();
        let session = ended_after(50);
        let record = policy.finalize(verified_record(&session), &session, 6, FIVE_MIN);
        assert_eq!(record.status, AttendanceStatus::Partial);
    }

    #[test]
    fn test_finalize_nine_unverified_is_absent() {
        let policy = AttendancePolicy::default();
        let session = ended_after(50);
        let mut record = verified_record(&session);
        record.biometric_verified = false;
        let record = policy.finalize(record, &session, 9, FIVE_MIN);
        assert_eq!(record.status, AttendanceStatus::Absent);
    }

    #[test]
    fn test_derive_status_boundaries() {
        let policy = AttendancePolicy::default();
        assert_eq!(policy.derive_status(8, 10, true), AttendanceStatus::Present);
        assert_eq!(policy.derive_status(7, 10, true), AttendanceStatus::Partial);
        assert_eq!(policy.derive_status(5, 10, true), AttendanceStatus::Partial);
        assert_eq!(policy.derive_status(4, 10, true), AttendanceStatus::Absent);
        assert_eq!(policy.derive_status(1, 1, true), AttendanceStatus::Present);
        assert_eq!(policy.derive_status(0, 1, true), AttendanceStatus::Absent);
    }

    #[test]
    fn test_validated_clamps_and_orders_thresholds() {
        let policy = AttendancePolicy {
            present_threshold: 1.5,
            partial_threshold: f64::NAN,
        }
        .validated();
        assert_eq!(policy.present_threshold, 1.0);
        assert_eq!(policy.partial_threshold, 0.5);

        let inverted = AttendancePolicy {
            present_threshold: 0.4,
            partial_threshold: 0.6,
        }
        .validated();
        assert_eq!(inverted.partial_threshold, 0.4);
    }
}
