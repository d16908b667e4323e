//! Periodic removal of dead records and stale rate-limit windows.
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::AppState;

/// Spawn the cleanup loop. Runs until the handle is aborted.
pub fn spawn(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_once(&state).await;
        }
    })
}

/// One cleanup pass; failures are logged and retried on the next tick
pub async fn sweep_once(state: &AppState) -> usize {
    state.rate_limiter.cleanup();
    match state.otp.purge_expired().await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(removed, "swept expired passcodes");
            }
            removed
        },
        Err(e) => {
            tracing::error!("expired passcode sweep failed: {e}");
            0
        },
    }
}
