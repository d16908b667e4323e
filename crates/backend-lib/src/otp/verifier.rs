// ============================
// crates/backend-lib/src/otp/verifier.rs
// ============================
//! Passcode verification.
//!
//! Rules, in order: missing record, expiry (deletes), mismatch (counts the
//! attempt, deletes once the bound is hit), replay, success. Every write is
//! conditioned on the version that was read; losing a race means re-reading
//! and evaluating again.
use ::metrics::counter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{OtpPolicy, OtpRecord, MAX_CONFLICT_RETRIES};
use crate::clock::Clock;
use crate::error::AppError;
use crate::metrics::{OTP_EXHAUSTED, OTP_EXPIRED, OTP_VERIFIED, OTP_VERIFY_FAILED};
use crate::storage::OtpStore;
use crate::validation::{normalize_identity, validate_code};

/// Successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub identity: String,
    pub verified_at: DateTime<Utc>,
}

/// Outcome of one evaluation round
enum Round {
    Done(Result<Verification, AppError>),
    /// The record changed under us
    Conflict,
}

/// Checks submitted passcodes against stored records
#[derive(Clone)]
pub struct OtpVerifier {
    store: Arc<dyn OtpStore>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

impl OtpVerifier {
    pub fn new(store: Arc<dyn OtpStore>, clock: Arc<dyn Clock>, policy: OtpPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Verify `submitted` for `identity`, consuming the passcode on success
    #[instrument(skip(self, submitted))]
    pub async fn verify(&self, identity: &str, submitted: &str) -> Result<Verification, AppError> {
        let identity = normalize_identity(identity)?;
        validate_code(submitted, self.policy.code_length)?;

        for _ in 0..MAX_CONFLICT_RETRIES {
            match self.evaluate(&identity, submitted).await? {
                Round::Done(outcome) => {
                    match &outcome {
                        Ok(_) => counter!(OTP_VERIFIED).increment(1),
                        Err(e) => {
                            counter!(OTP_VERIFY_FAILED, "kind" => e.kind().as_str()).increment(1);
                            debug!(kind = %e.kind(), "verification rejected");
                        },
                    }
                    return outcome;
                },
                Round::Conflict => debug!("record changed during verification, re-reading"),
            }
        }

        Err(AppError::Internal(
            "passcode verification kept conflicting with concurrent updates".to_string(),
        ))
    }

    async fn evaluate(&self, identity: &str, submitted: &str) -> Result<Round, AppError> {
        let Some(record) = self.store.get(identity).await? else {
            return Ok(Round::Done(Err(AppError::NotFound)));
        };
        let now = self.clock.now();
        let version = record.version();

        if record.is_expired(now) {
            if !self.store.compare_and_swap(identity, Some(version), None).await? {
                return Ok(Round::Conflict);
            }
            counter!(OTP_EXPIRED).increment(1);
            info!("expired passcode removed");
            return Ok(Round::Done(Err(AppError::Expired)));
        }

        if !record.code.matches(submitted) {
            return self.reject_mismatch(identity, &record).await;
        }

        if record.verified {
            return Ok(Round::Done(Err(AppError::AlreadyVerified)));
        }

        let verified = record.mark_verified(now);
        let verified_at = verified.verified_at.unwrap_or(now);
        if !self
            .store
            .compare_and_swap(identity, Some(version), Some(verified))
            .await?
        {
            return Ok(Round::Conflict);
        }

        info!("passcode verified");
        Ok(Round::Done(Ok(Verification {
            identity: identity.to_string(),
            verified_at,
        })))
    }

    /// Count a failed attempt; invalidate the record once the bound is reached
    async fn reject_mismatch(&self, identity: &str, record: &OtpRecord) -> Result<Round, AppError> {
        // a consumed record is final, wrong guesses against it change nothing
        if record.verified {
            return Ok(Round::Done(Err(AppError::Mismatch)));
        }

        let version = record.version();
        let failed = record.with_failed_attempt();
        let exhausted = failed.failed_attempts >= self.policy.max_attempts;
        let next = if exhausted { None } else { Some(failed) };

        if !self.store.compare_and_swap(identity, Some(version), next).await? {
            return Ok(Round::Conflict);
        }

        if exhausted {
            counter!(OTP_EXHAUSTED).increment(1);
            warn!(
                attempts = self.policy.max_attempts,
                "too many mismatches, passcode invalidated"
            );
        }
        Ok(Round::Done(Err(AppError::Mismatch)))
    }
}
