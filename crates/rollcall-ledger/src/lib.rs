//! Attendance recording and finalization for Rollcall.
//!
//! Students submit the token their device picked up; the ledger checks it,
//! keeps one [`AttendanceRecord`](rollcall_model::AttendanceRecord) per
//! student per session, and turns submission counts plus a biometric
//! check-out into a final verdict.
//!
//! # Key types
//!
//! - [`AttendanceLedger`]: records submissions, runs check-out, finalizes
//! - [`AttendancePolicy`]: the pure verdict function and its thresholds
//! - [`BiometricVerifier`]: pluggable check-out verification
//! - [`LedgerError`]: everything that can go wrong

mod biometric;
mod error;
mod ledger;
mod policy;

pub use biometric::{BiometricVerifier, ReferenceVerifier};
pub use error::LedgerError;
pub use ledger::{
    AttendanceLedger, BIOMETRIC_COMPLETED, LedgerReceipt, SUBMISSION_RECORDED, TokenSubmission,
};
pub use policy::AttendancePolicy;
