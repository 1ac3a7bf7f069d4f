//! Exponential-backoff retry for the resilient request path.

use crate::error::BusError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff shape: `max_retries`, `initial_delay`, `max_delay`, growth
/// `base`, and whether to apply jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub base: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Attempt `i` uses `min(initial_delay * base^i, max_delay)`, scaled by
    /// a uniform `[0.5, 1.5]` jitter factor when `jitter` is set.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.base.powi(attempt.try_into().unwrap_or(i32::MAX));
        let capped = scaled.min(self.max_delay.as_secs_f64());
        let factor = if self.jitter {
            rand::thread_rng().gen_range(0.5..1.5)
        } else {
            1.0
        };
        Duration::from_secs_f64((capped * factor).max(0.0))
    }
}

/// Retries `op` until it succeeds, exhausts `policy.max_retries`, or fails
/// with a non-transient [`BusError`] (only `timeout`-like kinds are
/// retried; `invalid_input` and `permission` are not). On exhaustion, the
/// last error is surfaced as-is.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, BusError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BusError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt > 0 {
                    tracing::error!(attempts = attempt, error = %err, "retry exhausted");
                }
                return Err(err);
            }
        }
    }
}
