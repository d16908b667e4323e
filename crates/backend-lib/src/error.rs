// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use passreset_common::{ErrorBody, ErrorDetail, ErrorKind};
use thiserror::Error;

use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Identity is not registered")]
    NotRegistered,

    #[error("No pending passcode for identity")]
    NotFound,

    #[error("Passcode expired")]
    Expired,

    #[error("Passcode mismatch")]
    Mismatch,

    #[error("Passcode already verified")]
    AlreadyVerified,

    #[error("Passcode delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Failure category exposed to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::NotRegistered => ErrorKind::NotRegistered,
            AppError::NotFound => ErrorKind::NotFound,
            AppError::Expired => ErrorKind::Expired,
            AppError::Mismatch => ErrorKind::Mismatch,
            AppError::AlreadyVerified => ErrorKind::AlreadyVerified,
            AppError::DeliveryFailed(_) => ErrorKind::DeliveryFailed,
            AppError::RateLimited => ErrorKind::RateLimited,
            AppError::Internal(_) | AppError::Io(_) | AppError::Json(_) => ErrorKind::Internal,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::NotRegistered | ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Expired => StatusCode::GONE,
            ErrorKind::Mismatch => StatusCode::UNAUTHORIZED,
            ErrorKind::AlreadyVerified => StatusCode::CONFLICT,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::DeliveryFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "VAL_001",
            AppError::NotRegistered => "DIR_001",
            AppError::NotFound => "OTP_001",
            AppError::Expired => "OTP_002",
            AppError::Mismatch => "OTP_003",
            AppError::AlreadyVerified => "OTP_004",
            AppError::DeliveryFailed(_) => "DLV_001",
            AppError::RateLimited => "RATE_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidArgument(_) => "Invalid input provided".to_string(),
            AppError::NotRegistered => "This email is not registered".to_string(),
            AppError::NotFound => "No passcode was requested for this email".to_string(),
            AppError::Expired => "Passcode has expired, please request a new one".to_string(),
            AppError::Mismatch => "Invalid passcode".to_string(),
            AppError::AlreadyVerified => "Passcode has already been used".to_string(),
            AppError::DeliveryFailed(_) => {
                "Passcode could not be sent, please try again".to_string()
            },
            AppError::RateLimited => "Too many requests, please try again later".to_string(),
            AppError::Internal(_) | AppError::Io(_) | AppError::Json(_) => {
                "An internal server error occurred".to_string()
            },
        }
    }

    /// Build the JSON error envelope
    pub fn to_body(&self) -> ErrorBody {
        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                code: self.error_code().to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "request failed: {self}");
        }
        (status, axum::Json(self.to_body())).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidArgument(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
