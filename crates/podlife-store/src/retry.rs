//! Bounded retry with exponential backoff for revision conflicts.
//!
//! Only [`StoreError::Conflict`](crate::StoreError::Conflict) is retried,
//! and only inside [`ReconciliationStore::merge`](crate::ReconciliationStore::merge).
//! Unavailability is reported to the caller straight away.

use std::time::Duration;

/// Default number of save attempts per merge, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay after the first conflict (doubles each attempt: 10ms,
/// 20ms, 40ms, ...).
pub const DEFAULT_BASE_DELAY_MS: u64 = 10;

/// Upper bound on any single backoff delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 1_000;

/// Retry budget for conflicting saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total save attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay after the first conflict.
    pub base_delay: Duration,
    /// Cap on a single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }

    /// Fail on the first conflict.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        )
    }
}
