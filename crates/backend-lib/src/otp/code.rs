// ============================
// crates/backend-lib/src/otp/code.rs
// ============================
/** Passcode generation and comparison
Codes are drawn uniformly from the fixed digit space using an OS-seeded
CSPRNG and zero-padded to the configured width. */
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Default passcode width
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Supported passcode widths
pub const MIN_CODE_LENGTH: usize = 4;
pub const MAX_CODE_LENGTH: usize = 10;

/// A numeric one-time passcode.
///
/// Never printed: `Debug` and `Display` are redacted, and the buffer is wiped on drop.
/// Use [`Passcode::expose`] only on the delivery path.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Passcode(String);

impl Passcode {
    /** Generate a fresh passcode of `length` digits
    # Panics
    If `length` is outside `MIN_CODE_LENGTH..=MAX_CODE_LENGTH` */
    pub fn generate(length: usize) -> Self {
        assert!(
            (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length),
            "code length must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH}"
        );
        let space = 10u64.pow(length as u32);
        let value = rand::rng().random_range(0..space);
        Self(format!("{value:0length$}"))
    }

    /// Constant-time comparison against a submitted code
    pub fn matches(&self, submitted: &str) -> bool {
        self.0.as_bytes().ct_eq(submitted.as_bytes()).into()
    }

    /// Plaintext access for the delivery channel
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passcode(<redacted>)")
    }
}

impl fmt::Display for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Drop for Passcode {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
impl From<&str> for Passcode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}
