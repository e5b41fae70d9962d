//! Retry schedule for coordinator requests.

use std::time::Duration;

use dtd_core::config::RetryConfig;

/// Exponential backoff between attempts of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Per-attempt reply wait.
    pub reply_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(retry: &RetryConfig, reply_timeout: Duration) -> Self {
        Self {
            max_retries: retry.max_retries,
            reply_timeout,
            backoff_base: Duration::from_millis(retry.backoff_base_ms),
            backoff_multiplier: retry.backoff_multiplier,
            max_backoff: Duration::from_millis(retry.max_backoff_ms),
        }
    }

    /// Single attempt, no backoff.
    pub fn once(reply_timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            reply_timeout,
            backoff_base: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep after timed-out attempt `attempt` (0-based):
    /// `base * multiplier^attempt`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw_ms = self.backoff_base.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let max_ms = self.max_backoff.as_millis() as f64;
        if !raw_ms.is_finite() || raw_ms >= max_ms {
            return self.max_backoff;
        }
        Duration::from_millis(raw_ms.max(0.0) as u64)
    }

    /// Worst-case duration of a request that never gets an answer.
    pub fn worst_case(&self) -> Duration {
        (0..self.attempts()).fold(Duration::ZERO, |total, attempt| {
            let backoff = if attempt < self.max_retries {
                self.backoff_for(attempt)
            } else {
                Duration::ZERO
            };
            total + self.reply_timeout + backoff
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), Duration::from_millis(500))
    }
}
