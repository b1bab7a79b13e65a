//! Shared model for Rollcall.
//!
//! This crate defines the vocabulary every other layer speaks:
//!
//! - **Types** ([`Session`], [`Token`], [`Submission`], [`AttendanceRecord`],
//!   [`Student`]) and their identifiers.
//! - **Storage seam** ([`Store`] trait, [`MemoryStore`]): the persistence
//!   interface the core consumes. Each method is atomic.
//! - **Clock** ([`Clock`], [`SystemClock`], [`ManualClock`]): where "now"
//!   comes from.
//! - **Locks** ([`SessionLocks`]): session- and student-scoped mutual
//!   exclusion shared by the issuer and the ledger.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how reports become bytes.
//! - **Errors** ([`ErrorKind`], [`StoreError`], [`CodecError`]).
//!
//! # Architecture
//!
//! ```text
//! rollcall (lifecycle, reports)
//!     ↕
//! rollcall-ledger   rollcall-rotation
//!     ↕                 ↕
//! rollcall-token (issue / validate)
//!     ↕
//! rollcall-model (this crate)
//! ```

mod clock;
mod codec;
mod error;
mod locks;
mod memory;
mod store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{CodecError, ErrorKind, StoreError};
pub use locks::{LockGuard, SessionLocks};
pub use memory::MemoryStore;
pub use store::{Rotation, Store};
pub use types::{
    AttendanceRecord, AttendanceStatus, NewToken, OwnerId, Session, SessionId,
    SessionMetadata, Student, StudentId, Submission, Token, TokenId,
};
