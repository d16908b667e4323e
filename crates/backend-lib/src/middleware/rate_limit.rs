// ============================
// crates/backend-lib/src/middleware/rate_limit.rs
// ============================
//! Fixed-window rate limiting per client.
use ::metrics::counter;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::HTTP_RATE_LIMITED;
use crate::{error::AppError, AppState};

/// Header carrying the client address set by the fronting proxy
pub const CLIENT_IP_HEADER: &str = "x-real-ip";

/// Rate limit entry for a client
#[derive(Debug, Clone)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

/// Counts requests per client key within a fixed window
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateLimitEntry>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    /// Record a request from `client`; false once the window's budget is spent
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(client.to_string())
            .or_insert_with(|| RateLimitEntry {
                requests: 0,
                window_start: now,
            });

        // Check if window has expired
        if now.duration_since(entry.window_start) > self.window {
            entry.requests = 0;
            entry.window_start = now;
        }

        if entry.requests >= self.max_requests {
            return false;
        }

        entry.requests += 1;
        true
    }

    /// Drop windows that have run out
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, entry| now.duration_since(entry.window_start) <= self.window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Rate limiter middleware
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Get client IP
    let client_ip = request
        .headers()
        .get(CLIENT_IP_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if !state.rate_limiter.check(&client_ip) {
        counter!(HTTP_RATE_LIMITED).increment(1);
        tracing::info!(client = %client_ip, "request rate limited");
        return Err(AppError::RateLimited);
    }

    // Continue to next middleware/handler
    Ok(next.run(request).await)
}
