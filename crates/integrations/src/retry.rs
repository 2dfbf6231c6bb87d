//! Retry schedule for calls to the email platform.

use std::time::Duration;

use campaign_core::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts made before giving up, the first one included.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Wait applied on HTTP 429 when the response has no usable `Retry-After`.
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
            backoff_multiplier: config.backoff_multiplier,
            default_retry_after: Duration::from_secs(config.default_retry_after_secs),
        }
    }
}

impl RetryPolicy {
    /// Backoff after a failed transport attempt (0-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(base_ms.min(self.max_backoff_ms as f64) as u64)
    }

    /// Wait requested by a rate-limited response. Only the delay-seconds form
    /// of `Retry-After` is honored.
    pub fn retry_after(&self, header: Option<&str>) -> Duration {
        header
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_retries
    }
}
