//! Provider-side rate gating for fetch dispatches.
//!
//! The coordinator bounds concurrency, but a burst of short fetches can
//! still exceed what the provider tolerates per unit time. The gate
//! spreads dispatches across the quota window so batch runs stay inside
//! the provider's request budget.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// In-memory rate gate shared by all fetch tasks of one coordinator.
#[derive(Clone)]
pub struct FetchGate {
    limiter: Arc<DirectRateLimiter>,
    wait_hint: Duration,
}

impl FetchGate {
    pub fn new(quota_window: Duration, quota_limit: u32, wait_hint: Duration) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            wait_hint,
        }
    }

    /// Try to take one unit of rate budget. When the window is exhausted
    /// the recommended wait before re-checking is returned.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }
        Err(self.wait_hint)
    }

    /// Wait until rate budget is available.
    pub async fn wait_ready(&self) {
        while let Err(wait) = self.try_acquire() {
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for FetchGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 5, Duration::from_millis(200))
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
