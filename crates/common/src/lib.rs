// ================
// common/src/lib.rs
// ================
//! Wire types shared between the password-reset service and its clients.
//! This module defines the JSON request/response bodies of the OTP API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/otp/issue`
/// # Fields
/// * `identity` - Email address of the account being recovered
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub identity: String,
}

/// Body of `POST /api/otp/verify`
/// # Fields
/// * `identity` - Email address the code was issued for
/// * `code` - Passcode the user received
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    pub identity: String,
    pub code: String,
}

impl fmt::Debug for VerifyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyRequest")
            .field("identity", &self.identity)
            .field("code", &"<redacted>")
            .finish()
    }
}

/// Successful response of both OTP endpoints. Carries no other payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: SuccessResponse = SuccessResponse { success: true };
}

/// Failure categories surfaced to callers
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed identity or code
    InvalidArgument,
    /// Identity unknown to the account directory
    NotRegistered,
    /// No pending passcode for the identity
    NotFound,
    /// Passcode time-to-live elapsed
    Expired,
    /// Submitted code does not match
    Mismatch,
    /// Passcode was already consumed
    AlreadyVerified,
    /// Passcode stored but the notification could not be sent
    DeliveryFailed,
    /// Too many requests, retry later
    RateLimited,
    /// Storage or transport failure
    Internal,
}

impl ErrorKind {
    /// Whether the caller can recover by retrying or re-issuing
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound
                | ErrorKind::Expired
                | ErrorKind::Mismatch
                | ErrorKind::DeliveryFailed
                | ErrorKind::RateLimited
                | ErrorKind::Internal
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotRegistered => "not_registered",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Expired => "expired",
            ErrorKind::Mismatch => "mismatch",
            ErrorKind::AlreadyVerified => "already_verified",
            ErrorKind::DeliveryFailed => "delivery_failed",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error envelope returned with every non-2xx response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Error details
/// # Fields
/// * `kind` - Failure category
/// * `code` - Stable machine-readable error code
/// * `message` - Human-readable message
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}
