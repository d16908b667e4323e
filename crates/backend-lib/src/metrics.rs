// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const OTP_ISSUED: &str = "otp.issued";
pub const OTP_DELIVERY_FAILED: &str = "otp.delivery_failed";
pub const OTP_VERIFIED: &str = "otp.verified";
pub const OTP_VERIFY_FAILED: &str = "otp.verify_failed";
pub const OTP_EXPIRED: &str = "otp.expired";
pub const OTP_EXHAUSTED: &str = "otp.exhausted";
pub const OTP_SWEPT: &str = "otp.swept";
pub const HTTP_RATE_LIMITED: &str = "http.rate_limited";
