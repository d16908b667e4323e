// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Input validation for identities and submitted passcodes.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid code: {0}")]
    InvalidCode(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email identity and return its normalized form (trimmed, lower-cased).
///
/// Every store key goes through here, so `A@X.com ` and `a@x.com` share a record.
/// The local part is folded too, on purpose: directory lookup, store key and
/// mail recipient all use the folded form.
pub fn normalize_identity(raw: &str) -> ValidationResult<String> {
    let identity = raw.trim();

    if identity.is_empty() {
        return Err(ValidationError::InvalidIdentity(
            "Email must not be empty".to_string(),
        ));
    }

    if identity.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidIdentity(format!(
            "Email must be at most {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(identity) {
        return Err(ValidationError::InvalidIdentity(
            "Email address is not valid".to_string(),
        ));
    }

    Ok(identity.to_lowercase())
}

/// Validate a submitted passcode: exactly `length` ASCII digits.
pub fn validate_code(code: &str, length: usize) -> ValidationResult<&str> {
    if code.is_empty() {
        return Err(ValidationError::InvalidCode("Code must not be empty".to_string()));
    }

    if code.len() != length || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidCode(format!(
            "Code must be exactly {length} digits"
        )));
    }

    Ok(code)
}
