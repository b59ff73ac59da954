//! Injectable retry policy for hub calls.
//!
//! The synchronizer itself never retries; whether and how often a failed
//! hub call is re-issued is a deployment decision, so the policy is a trait
//! the client is constructed with. Only transport failures and 5xx
//! responses are ever retried; a 4xx means the request itself is wrong and
//! is surfaced immediately.

use std::time::Duration;

use hublink_config::RetryConfig;

/// Decides whether a failed attempt is retried, and after how long.
pub trait RetryPolicy: Send + Sync {
    /// Delay before retry number `attempt` (zero-based count of retries
    /// already performed). `None` gives up and surfaces the error.
    fn delay_for(&self, attempt: u32) -> Option<Duration>;
}

/// Surfaces every failure immediately. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn delay_for(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Retries up to `max_retries` times with a fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub max_retries: u32,
    pub delay: Duration,
}

impl FixedDelay {
    pub fn from_config(config: &RetryConfig) -> Self {
        FixedDelay {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn delay_for(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_retries).then_some(self.delay)
    }
}
