//! # Rollcall
//!
//! Classroom attendance from rotating proximity tokens and a biometric
//! check-out.
//!
//! An instructor opens a session; its token rotates every few minutes and the
//! instructor's device broadcasts whichever one is current. Students' devices
//! pick the token up and submit it. At the end of class each student
//! checks out biometrically, and the ledger turns "how many tokens did you
//! submit, and was it really you" into present, partial, or absent.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rollcall::prelude::*;
//!
//! # async fn demo() -> Result<(), RollcallError> {
//! rollcall::telemetry::init_tracing();
//! let rollcall = RollcallBuilder::new()
//!     .config(RollcallConfig::from_env())
//!     .build(Arc::new(MemoryStore::new()));
//!
//! let session = rollcall
//!     .open(OwnerId(1), SessionMetadata::default())
//!     .await?;
//! // ... students submit, check out ...
//! rollcall.close(session.id).await?;
//! let report = rollcall.attendance_report(session.id).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod lifecycle;
mod report;
mod service;
pub mod telemetry;

pub use config::RollcallConfig;
pub use error::RollcallError;
pub use lifecycle::SessionLifecycle;
pub use report::AttendanceEntry;
pub use service::{Rollcall, RollcallBuilder};

/// Everything needed to embed Rollcall.
pub mod prelude {
    pub use crate::{
        AttendanceEntry, Rollcall, RollcallBuilder, RollcallConfig, RollcallError,
        SessionLifecycle,
    };
    pub use rollcall_ledger::{
        AttendanceLedger, AttendancePolicy, BiometricVerifier, LedgerError, LedgerReceipt,
        ReferenceVerifier, TokenSubmission,
    };
    pub use rollcall_model::{
        AttendanceRecord, AttendanceStatus, Clock, Codec, ErrorKind, JsonCodec, ManualClock,
        MemoryStore, OwnerId, Session, SessionId, SessionMetadata, Store, Student, StudentId,
        SystemClock, Token, TokenId,
    };
    pub use rollcall_rotation::{RotationError, RotationScheduler, RotationState, RotationStats};
    pub use rollcall_token::{
        Acceptance, EntropySource, OsEntropy, TokenConfig, TokenError, TokenIssuer,
        TokenValidator, Validation,
    };
}
