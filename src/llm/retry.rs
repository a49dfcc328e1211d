//! Backoff policy for rate-limited completion requests

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const RATE_LIMIT_STATUS: u16 = 429;

/// How many times a 429 is retried and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each later one
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 8000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`: `min(2^attempt * base, max)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Only HTTP 429 is retried
pub fn is_rate_limited(status: u16) -> bool {
    status == RATE_LIMIT_STATUS
}
