//! Token configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Controls token lifetime, size, and tolerance.
///
/// Sensible defaults are provided: a 5-minute rotation, 16 random bytes
/// per token, and a 2-minute grace window past expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// How long a token lives, and how often the scheduler replaces it.
    pub rotation_interval: Duration,

    /// Number of random bytes per token before encoding.
    pub token_bytes: usize,

    /// How long after expiry a token is still accepted. Absorbs the race
    /// between the instructor's screen showing a new token and a student
    /// submitting the one it just replaced.
    pub grace_period: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            rotation_interval: Duration::from_secs(5 * 60),
            token_bytes: 16,
            grace_period: Duration::from_secs(2 * 60),
        }
    }
}

impl TokenConfig {
    pub const MIN_ROTATION_INTERVAL: Duration = Duration::from_secs(60);
    pub const MAX_ROTATION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const MIN_TOKEN_BYTES: usize = 8;
    pub const MAX_TOKEN_BYTES: usize = 64;

    /// Default config with a rotation interval of `minutes`.
    pub fn with_rotation_minutes(minutes: u64) -> Self {
        Self {
            rotation_interval: Duration::from_secs(minutes.saturating_mul(60)),
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `rotation_interval` clamped to 1 minute ..= 24 hours.
    /// - `token_bytes` clamped to 8 ..= 64.
    /// - `grace_period` capped at the rotation interval.
    pub fn validated(mut self) -> Self {
        let clamped = self
            .rotation_interval
            .clamp(Self::MIN_ROTATION_INTERVAL, Self::MAX_ROTATION_INTERVAL);
        if clamped != self.rotation_interval {
            warn!(
                requested_secs = self.rotation_interval.as_secs(),
                clamped_secs = clamped.as_secs(),
                "rotation_interval out of range, clamping"
            );
            self.rotation_interval = clamped;
        }

        let bytes = self
            .token_bytes
            .clamp(Self::MIN_TOKEN_BYTES, Self::MAX_TOKEN_BYTES);
        if bytes != self.token_bytes {
            warn!(
                requested = self.token_bytes,
                clamped = bytes,
                "token_bytes out of range, clamping"
            );
            self.token_bytes = bytes;
        }

        if self.grace_period > self.rotation_interval {
            warn!(
                grace_secs = self.grace_period.as_secs(),
                rotation_secs = self.rotation_interval.as_secs(),
                "grace_period longer than rotation_interval, capping"
            );
            self.grace_period = self.rotation_interval;
        }
        self
    }

    /// The rotation interval as a `chrono` delta, for timestamp arithmetic.
    pub fn rotation_delta(&self) -> chrono::Duration {
        to_delta(self.rotation_interval)
    }

    /// The grace period as a `chrono` delta.
    pub fn grace_delta(&self) -> chrono::Duration {
        to_delta(self.grace_period)
    }
}

fn to_delta(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
