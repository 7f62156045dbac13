/*!
 * Retry budget and exponential backoff for synthesis calls.
 */

use rand::Rng;
use std::time::Duration;

use crate::app_config::SynthesisCommonConfig;

/// How often and how patiently a segment is retried
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total calls allowed per segment, the first one included
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Add up to 50% random delay so workers do not retry in lockstep
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(common: &SynthesisCommonConfig) -> Self {
        Self {
            max_attempts: common.max_attempts.max(1),
            base_delay: Duration::from_millis(common.retry_backoff_ms),
            max_delay: Duration::from_millis(common.max_backoff_ms.max(common.retry_backoff_ms)),
            jitter: common.retry_jitter,
        }
    }

    /// Policy without delays, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Whether a segment that has used `attempts` calls may be called again
    pub fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before the next call after failed attempt number `attempt` (1-based).
    ///
    /// `base * 2^(attempt-1)`, capped at `max_delay`, before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let base_ms = self.base_delay.as_millis().min(u128::from(u64::MAX)) as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << exponent);
        let capped = Duration::from_millis(delay_ms).min(self.max_delay);

        if self.jitter && !capped.is_zero() {
            let extra = rand::rng().random_range(0..=capped.as_millis() as u64 / 2);
            capped + Duration::from_millis(extra)
        } else {
            capped
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SynthesisCommonConfig::default())
    }
}
