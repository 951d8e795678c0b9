//! Ingestion configuration.
//!
//! Components receive configuration as an explicit injected value rather
//! than reading environment state at call time, so each one stays
//! testable with a config built inline.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Knobs governing one ingestion batch.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum simultaneous fetches.
    pub fetch_width: usize,
    /// Provider rate budget: `quota_limit` dispatches per `quota_window`.
    pub quota_window: Duration,
    pub quota_limit: u32,
    /// Wait before re-checking an exhausted rate window.
    pub throttle_wait: Duration,
    /// Retry policy for fetches whose error is marked retryable.
    pub retry: RetryPolicy,
    /// Stop dispatching new fetches once this much wall time has passed.
    /// Fetches already running are allowed to finish.
    pub deadline: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_width: 10,
            quota_window: Duration::from_secs(1),
            quota_limit: 5,
            throttle_wait: Duration::from_millis(200),
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }
}

impl IngestConfig {
    /// Fast-path configuration for offline runs and tests: no retries, a
    /// wide-open rate window.
    pub fn offline() -> Self {
        Self {
            quota_limit: 1_000,
            retry: RetryPolicy::no_retry(),
            ..Self::default()
        }
    }
}
