// ============================
// crates/backend-lib/src/otp/issuer.rs
// ============================
//! Passcode issuance.
use ::metrics::counter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{OtpPolicy, OtpRecord, Passcode, MAX_CONFLICT_RETRIES};
use crate::clock::Clock;
use crate::delivery::Delivery;
use crate::directory::Directory;
use crate::error::AppError;
use crate::metrics::{OTP_DELIVERY_FAILED, OTP_ISSUED};
use crate::storage::OtpStore;
use crate::validation::normalize_identity;

/// Generates, persists and dispatches passcodes
#[derive(Clone)]
pub struct OtpIssuer {
    store: Arc<dyn OtpStore>,
    directory: Arc<dyn Directory>,
    delivery: Arc<dyn Delivery>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

impl OtpIssuer {
    pub fn new(
        store: Arc<dyn OtpStore>,
        directory: Arc<dyn Directory>,
        delivery: Arc<dyn Delivery>,
        clock: Arc<dyn Clock>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            delivery,
            clock,
            policy,
        }
    }

    /// Issue a new passcode for `identity`, replacing any pending one.
    ///
    /// The record is persisted before delivery is attempted. A delivery
    /// failure is reported as [`AppError::DeliveryFailed`] but the stored
    /// code stays valid, so the caller can resend.
    #[instrument(skip(self))]
    pub async fn issue(&self, identity: &str) -> Result<OtpRecord, AppError> {
        let identity = normalize_identity(identity)?;

        if !self.directory.exists(&identity).await? {
            info!("issuance refused, identity not registered");
            return Err(AppError::NotRegistered);
        }

        let record = self.persist(&identity).await?;
        counter!(OTP_ISSUED).increment(1);
        info!(expires_at = %record.expires_at, "passcode issued");

        if let Err(e) = self.delivery.deliver(&identity, &record.code).await {
            counter!(OTP_DELIVERY_FAILED).increment(1);
            warn!("passcode delivery failed, code remains valid: {e:#}");
            return Err(AppError::DeliveryFailed(e.to_string()));
        }

        Ok(record)
    }

    /// Write a fresh record, honouring the resend cooldown
    async fn persist(&self, identity: &str) -> Result<OtpRecord, AppError> {
        if self.policy.resend_cooldown.is_zero() {
            let record = self.fresh_record(identity, self.clock.now())?;
            self.store.put(record.clone()).await?;
            return Ok(record);
        }

        for _ in 0..MAX_CONFLICT_RETRIES {
            let current = self.store.get(identity).await?;
            let now = self.clock.now();

            if let Some(existing) = &current {
                let live = !existing.verified && !existing.is_expired(now);
                if live && now - existing.issued_at < self.policy.resend_cooldown {
                    info!("issuance refused, resend cooldown active");
                    return Err(AppError::RateLimited);
                }
            }

            let record = self.fresh_record(identity, now)?;
            let expected = current.as_ref().map(OtpRecord::version);
            if self
                .store
                .compare_and_swap(identity, expected, Some(record.clone()))
                .await?
            {
                return Ok(record);
            }
        }

        Err(AppError::Internal(
            "passcode issuance kept conflicting with concurrent updates".to_string(),
        ))
    }

    /// Unverified record issued at `now`, the same instant the cooldown was judged at
    fn fresh_record(&self, identity: &str, now: DateTime<Utc>) -> Result<OtpRecord, AppError> {
        OtpRecord::new(
            identity.to_string(),
            Passcode::generate(self.policy.code_length),
            now,
            self.policy.ttl,
        )
    }
}
