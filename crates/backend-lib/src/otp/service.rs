//! Issuer and verifier over one set of injected collaborators.
use ::metrics::counter;
use std::sync::Arc;

use super::{OtpIssuer, OtpPolicy, OtpRecord, OtpVerifier, Verification};
use crate::clock::Clock;
use crate::delivery::Delivery;
use crate::directory::Directory;
use crate::error::AppError;
use crate::metrics::OTP_SWEPT;
use crate::storage::OtpStore;

/// The OTP facade used by the HTTP layer and the sweeper
#[derive(Clone)]
pub struct OtpService {
    issuer: OtpIssuer,
    verifier: OtpVerifier,
    store: Arc<dyn OtpStore>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        directory: Arc<dyn Directory>,
        delivery: Arc<dyn Delivery>,
        clock: Arc<dyn Clock>,
        policy: OtpPolicy,
    ) -> Self {
        let issuer = OtpIssuer::new(
            Arc::clone(&store),
            directory,
            delivery,
            Arc::clone(&clock),
            policy.clone(),
        );
        let verifier = OtpVerifier::new(Arc::clone(&store), Arc::clone(&clock), policy.clone());
        Self {
            issuer,
            verifier,
            store,
            clock,
            policy,
        }
    }

    pub async fn issue(&self, identity: &str) -> Result<OtpRecord, AppError> {
        self.issuer.issue(identity).await
    }

    pub async fn verify(&self, identity: &str, code: &str) -> Result<Verification, AppError> {
        self.verifier.verify(identity, code).await
    }

    /// Delete every dead record; returns how many were removed
    pub async fn purge_expired(&self) -> Result<usize, AppError> {
        let removed = self.store.purge_expired(self.clock.now()).await?;
        if removed > 0 {
            counter!(OTP_SWEPT).increment(removed as u64);
        }
        Ok(removed)
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }
}
