//! Rotating proximity tokens for Rollcall.
//!
//! This crate handles the short-lived secrets an instructor's device
//! broadcasts and students submit back:
//!
//! 1. **Issuance**: minting a fresh random token and retiring the previous
//!    one ([`TokenIssuer`])
//! 2. **Validation**: deciding whether a submitted value was live at the
//!    submission time, with a grace window for rotation races
//!    ([`TokenValidator`])
//! 3. **Entropy**: where the random bytes come from ([`EntropySource`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Ledger / Rotation (above)  ← validate submissions, rotate on a timer
//!     ↕
//! Token layer (this crate)   ← mint and check tokens
//!     ↕
//! Model (below)              ← Store, Clock, SessionLocks
//! ```

mod config;
mod entropy;
mod error;
mod issuer;
mod validator;

pub use config::TokenConfig;
pub use entropy::{EntropySource, OsEntropy, encode_token};
pub use error::TokenError;
pub use issuer::TokenIssuer;
pub use validator::{Acceptance, TokenValidator, Validation};
