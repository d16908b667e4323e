//! Persisted OTP state, one record per identity.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::code::Passcode;
use crate::error::AppError;

/// Pending (or consumed) passcode for one identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    /// Normalized email address, the store key
    pub identity: String,
    pub code: Passcode,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    /// Mismatched submissions against this issuance
    pub failed_attempts: u32,
    /// Distinguishes successive issuances for the same identity
    pub issue_id: Uuid,
    /// Bumped on every mutation
    pub revision: u64,
}

/// Condition for atomic conditional updates.
///
/// A re-issue changes `issue_id`, any other write bumps `revision`, so a
/// matching version means nothing touched the record since it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordVersion {
    pub issue_id: Uuid,
    pub revision: u64,
}

impl OtpRecord {
    /// Fresh, unverified record valid for `ttl` from `now`
    pub fn new(
        identity: String,
        code: Passcode,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, AppError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal(format!("passcode ttl {ttl} out of range")))?;
        Ok(Self {
            identity,
            code,
            issued_at: now,
            expires_at,
            verified: false,
            verified_at: None,
            failed_attempts: 0,
            issue_id: Uuid::new_v4(),
            revision: 0,
        })
    }

    pub fn version(&self) -> RecordVersion {
        RecordVersion {
            issue_id: self.issue_id,
            revision: self.revision,
        }
    }

    /// Dead records are never usable, verified or not
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry, zero once dead
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// Next revision with the record consumed at `now`
    pub fn mark_verified(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.verified = true;
        // verified_at never precedes issuance even if the clock steps back
        next.verified_at = Some(now.max(self.issued_at));
        next.revision += 1;
        next
    }

    /// Next revision with one more failed attempt recorded
    pub fn with_failed_attempt(&self) -> Self {
        let mut next = self.clone();
        next.failed_attempts += 1;
        next.revision += 1;
        next
    }
}
