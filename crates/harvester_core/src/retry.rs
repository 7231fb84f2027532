use std::time::Duration;

use crate::job::DEFAULT_MAX_RETRIES;

/// Retry budget and backoff schedule shared by every retry site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retries_so_far + 1`: base doubled per
    /// previous retry, capped.
    pub fn backoff(&self, retries_so_far: u32) -> Duration {
        let factor = 2u32.saturating_pow(retries_so_far);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}
