//! Retry and politeness delays for outbound page fetches

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How the wait between attempts grows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `random_delay × attempt`
    #[default]
    Linear,
    /// `random_delay × 2^(attempt - 1)`, capped by `max_backoff_ms`
    Exponential,
}

/// Retry policy with a randomised base delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: BackoffStrategy,
    /// Upper bound for a single backoff wait
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_ms: 2_000,
            max_delay_ms: 5_000,
            strategy: BackoffStrategy::Linear,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting at all, used by tests and dry runs
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_delay_ms: 0,
            max_delay_ms: 0,
            strategy: BackoffStrategy::Linear,
            max_backoff_ms: 0,
        }
    }

    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Uniformly random delay in `[min_delay_ms, max_delay_ms]`
    pub fn random_delay(&self) -> Duration {
        let (low, high) = if self.min_delay_ms <= self.max_delay_ms {
            (self.min_delay_ms, self.max_delay_ms)
        } else {
            (self.max_delay_ms, self.min_delay_ms)
        };
        Duration::from_millis(fastrand::u64(low..=high))
    }

    /// Wait before the attempt following `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.random_delay();
        let scaled = match self.strategy {
            BackoffStrategy::Linear => base.saturating_mul(attempt.max(1)),
            BackoffStrategy::Exponential => {
                let exponent = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1_u32 << exponent)
            }
        };
        let cap = Duration::from_millis(self.max_backoff_ms.max(self.max_delay_ms));
        scaled.min(cap)
    }

    /// Runs `operation` until it succeeds, the error is not retryable, or the
    /// attempt ceiling is reached. The last error is returned on failure.
    pub async fn execute<T, E, F, Fut, R>(&self, label: &str, mut operation: F, is_retryable: R) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if is_retryable(&err) && self.should_retry(attempt) => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "⚠️ {} failed (attempt {}/{}): {} - retrying in {}ms",
                        label,
                        attempt,
                        self.max_attempts,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!("❌ {} failed after {} attempt(s): {}", label, attempt, err);
                    return Err(err);
                }
            }
        }
    }
}
