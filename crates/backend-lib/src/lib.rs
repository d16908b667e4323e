// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core functionality of the password-reset OTP service.

pub mod clock;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod otp;
pub mod router;
pub mod storage;
pub mod sweeper;
pub mod validation;


use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::middleware::RateLimiter;
use crate::otp::OtpService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Passcode issuance and verification
    pub otp: Arc<OtpService>,
    /// Settings the process was started with
    pub settings: Arc<Settings>,
    /// Rate limiter
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create a new application state
    pub fn new(otp: OtpService, settings: Settings) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            Duration::from_secs(settings.rate_limit.window_secs),
            settings.rate_limit.max_requests,
        ));

        Self {
            otp: Arc::new(otp),
            settings: Arc::new(settings),
            rate_limiter,
        }
    }
}
