//! Random-byte source for token values.
//!
//! The issuer never calls an RNG directly. It asks an [`EntropySource`],
//! which lets production use the operating system's CSPRNG while tests
//! plug in something deterministic.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::TokenError;

/// Fills buffers with cryptographically secure random bytes.
///
/// # Example
///
/// ```rust
/// use rollcall_token::{EntropySource, TokenError};
///
/// /// Repeats one byte. Only for tests.
/// struct Constant(u8);
///
/// impl EntropySource for Constant {
///     fn fill(&self, buf: &mut [u8]) -> Result<(), TokenError> {
///         buf.fill(self.0);
///         Ok(())
///     }
/// }
/// ```
pub trait EntropySource: Send + Sync + 'static {
    /// Overwrites every byte of `buf`.
    ///
    /// # Errors
    /// [`TokenError::Entropy`] if the source cannot produce bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), TokenError>;
}

/// The operating system's random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), TokenError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| TokenError::Entropy(e.to_string()))
    }
}

/// Encodes raw token bytes as URL-safe base64 (padded), the form that is
/// broadcast and submitted.
pub fn encode_token(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}
