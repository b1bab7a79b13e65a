//! Core entity types.
//!
//! Everything here is plain data: serializable, cloneable, and free of
//! behavior beyond small predicates. The layers above decide what these
//! values mean; the [`Store`](crate::Store) decides where they live.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque, globally unique identifier for a class session.
///
/// Serialized as the bare UUID string thanks to `#[serde(transparent)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generates a fresh random (v4) session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a student account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub u64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Identifier of the account that owns (teaches) a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

/// Store-assigned identifier of a token row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Descriptive data attached to a session when it is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Course the session belongs to (e.g. "Distributed Systems").
    pub course_name: String,
    /// Optional room or building identifier.
    pub classroom_location: Option<String>,
}

/// A single class session.
///
/// Invariant: `ended_at.is_some()` exactly when `active` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner: OwnerId,
    pub metadata: SessionMetadata,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates an open session starting at `started_at`.
    pub fn open(owner: OwnerId, metadata: SessionMetadata, started_at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            owner,
            metadata,
            active: true,
            started_at,
            ended_at: None,
        }
    }

    /// Returns `true` while the session accepts rotation.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Wall-clock length of the session, once it has ended.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A token as handed to the store for insertion. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub session_id: SessionId,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A rotating proximity token.
///
/// Immutable once created apart from `active`, which flips to `false`
/// when a successor is issued or the session closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub session_id: SessionId,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl Token {
    /// `created_at <= at <= expires_at`.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.created_at <= at && at <= self.expires_at
    }

    /// Expired before `at`, but no earlier than `at - grace`.
    pub fn expired_within(&self, at: DateTime<Utc>, grace: Duration) -> bool {
        self.expires_at < at && self.expires_at >= at - grace
    }
}

// ---------------------------------------------------------------------------
// Submissions and attendance
// ---------------------------------------------------------------------------

/// One accepted token submission. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub token_id: TokenId,
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub submitted_at: DateTime<Utc>,
    /// Received signal strength reported by the student's device, if any.
    pub signal: Option<i32>,
}

/// Derived attendance verdict.
///
/// ```text
/// Pending ──(finalize)──→ Present | Partial | Absent
/// ```
///
/// A finalized record can be finalized again (e.g. a later biometric
/// check-out on a closed session); the verdict is always recomputed from
/// scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Pending,
    Present,
    Partial,
    Absent,
}

impl AttendanceStatus {
    /// Returns `true` once the ledger has produced a verdict.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Present => write!(f, "present"),
            Self::Partial => write!(f, "partial"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Per-(session, student) attendance state. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub session_id: SessionId,
    pub student_id: StudentId,
    /// Timestamp of the first accepted submission.
    pub check_in: DateTime<Utc>,
    /// Timestamp of the biometric check-out, if it happened.
    pub check_out: Option<DateTime<Utc>>,
    pub biometric_verified: bool,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    /// A fresh pending record checked in at `check_in`.
    pub fn new(session_id: SessionId, student_id: StudentId, check_in: DateTime<Utc>) -> Self {
        Self {
            session_id,
            student_id,
            check_in,
            check_out: None,
            biometric_verified: false,
            status: AttendanceStatus::Pending,
        }
    }
}

/// A student account as far as attendance cares about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    /// Enrolled biometric template. `None` when the student never enrolled.
    pub biometric_reference: Option<String>,
}
