// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the password-reset HTTP API.

pub mod rate_limit;

pub use rate_limit::{rate_limit, RateLimiter};
