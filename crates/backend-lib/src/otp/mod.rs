// ============================
// crates/backend-lib/src/otp/mod.rs
// ============================
//! One-time passcode lifecycle: issuance, verification, expiry.

pub mod code;
pub mod issuer;
pub mod record;
pub mod service;
pub mod verifier;

use chrono::Duration;

pub use code::{Passcode, DEFAULT_CODE_LENGTH, MAX_CODE_LENGTH, MIN_CODE_LENGTH};
pub use issuer::OtpIssuer;
pub use record::{OtpRecord, RecordVersion};
pub use service::OtpService;
pub use verifier::{OtpVerifier, Verification};

/// Bound on re-reads when a conditional update loses a race
pub(crate) const MAX_CONFLICT_RETRIES: usize = 8;

/// Passcode lifecycle parameters
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    /// How long an issued code stays valid
    pub ttl: Duration,
    /// Number of digits
    pub code_length: usize,
    /// Mismatches tolerated before the record is invalidated
    pub max_attempts: u32,
    /// Minimum gap between issuances for one identity; zero disables
    pub resend_cooldown: Duration,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
            code_length: DEFAULT_CODE_LENGTH,
            max_attempts: 5,
            resend_cooldown: Duration::seconds(60),
        }
    }
}
