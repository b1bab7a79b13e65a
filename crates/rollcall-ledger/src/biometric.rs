//! Biometric check-out verification.

/// Decides whether a check-out payload matches a student's enrolled
/// reference.
///
/// Implementations must be cheap and synchronous; the ledger calls this
/// while holding the student's lock.
pub trait BiometricVerifier: Send + Sync + 'static {
    fn verify(&self, payload: &str, reference: Option<&str>) -> bool;
}

/// Reference comparison.
///
/// - empty payload → rejected
/// - no enrolled reference → any non-blank payload accepted
/// - otherwise → exact equality
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceVerifier;

impl BiometricVerifier for ReferenceVerifier {
    fn verify(&self, payload: &str, reference: Option<&str>) -> bool {
        if payload.is_empty() {
            return false;
        }
        match reference {
            None | Some("") => !payload.trim().is_empty(),
            Some(reference) => payload == reference,
        }
    }
}
