//! Top-level configuration.

use std::str::FromStr;
use std::time::Duration;

use rollcall_ledger::AttendancePolicy;
use rollcall_token::TokenConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Everything a Rollcall deployment can tune.
///
/// Defaults: 5-minute rotation, 16-byte tokens, 2-minute grace, 0.8/0.5
/// thresholds, no finalization on close.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    pub tokens: TokenConfig,
    pub policy: AttendancePolicy,
    /// Finalize every record of a session as part of closing it. Off by
    /// default: records are finalized by biometric check-out, or by an
    /// explicit `finalize_closed_session`.
    pub finalize_on_close: bool,
}

impl RollcallConfig {
    /// Create config from environment variables.
    ///
    /// Environment variables:
    /// - `ROLLCALL_ROTATION_MINUTES` - Token rotation interval (default: 5)
    /// - `ROLLCALL_TOKEN_BYTES` - Random bytes per token (default: 16)
    /// - `ROLLCALL_GRACE_MINUTES` - Grace window past expiry (default: 2)
    /// - `ROLLCALL_PRESENT_THRESHOLD` - Fraction for present (default: 0.8)
    /// - `ROLLCALL_PARTIAL_THRESHOLD` - Fraction for partial (default: 0.5)
    /// - `ROLLCALL_FINALIZE_ON_CLOSE` - `true`/`false` (default: false)
    ///
    /// Absent or unparsable values fall back to the default. The result is
    /// not yet [`validated`](Self::validated).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading from `lookup` instead of
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let rotation_minutes = parse_or(
            lookup("ROLLCALL_ROTATION_MINUTES"),
            "ROLLCALL_ROTATION_MINUTES",
            defaults.tokens.rotation_interval.as_secs() / 60,
        );
        let grace_minutes = parse_or(
            lookup("ROLLCALL_GRACE_MINUTES"),
            "ROLLCALL_GRACE_MINUTES",
            defaults.tokens.grace_period.as_secs() / 60,
        );
        let token_bytes = parse_or(
            lookup("ROLLCALL_TOKEN_BYTES"),
            "ROLLCALL_TOKEN_BYTES",
            defaults.tokens.token_bytes,
        );
        let present_threshold = parse_or(
            lookup("ROLLCALL_PRESENT_THRESHOLD"),
            "ROLLCALL_PRESENT_THRESHOLD",
            defaults.policy.present_threshold,
        );
        let partial_threshold = parse_or(
            lookup("ROLLCALL_PARTIAL_THRESHOLD"),
            "ROLLCALL_PARTIAL_THRESHOLD",
            defaults.policy.partial_threshold,
        );
        let finalize_on_close = lookup("ROLLCALL_FINALIZE_ON_CLOSE")
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(defaults.finalize_on_close);

        Self {
            tokens: TokenConfig {
                rotation_interval: Duration::from_secs(rotation_minutes.saturating_mul(60)),
                token_bytes,
                grace_period: Duration::from_secs(grace_minutes.saturating_mul(60)),
            },
            policy: AttendancePolicy {
                present_threshold,
                partial_threshold,
            },
            finalize_on_close,
        }
    }

    /// Clamp every value into its supported range, logging each clamp.
    pub fn validated(self) -> Self {
        Self {
            tokens: self.tokens.validated(),
            policy: self.policy.validated(),
            finalize_on_close: self.finalize_on_close,
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparsable config value, using default");
            default
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
