//! Retry helpers for transient failures
//!
//! [`BackoffPolicy`] computes the exponential delay the queue waits before
//! re-admitting a failed message. [`retry_async`] re-runs a fallible async
//! operation a fixed number of times with a constant pause between attempts.

use std::time::Duration;
use tokio::time::sleep;

/// Exponential backoff: `base * 2^attempt`, optionally capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_interval: Duration,
    pub max_interval: Option<Duration>,
}

impl BackoffPolicy {
    pub fn new(base_interval: Duration) -> Self {
        Self {
            base_interval,
            max_interval: None,
        }
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    /// Delay before retry number `attempt + 1`
    ///
    /// `attempt` is the number of retries already taken, so the first retry
    /// (`attempt == 0`) waits exactly the base interval.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self
            .base_interval
            .checked_mul(factor)
            .unwrap_or(Duration::MAX);
        match self.max_interval {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Fixed-delay retry policy for async operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Execute an async operation, retrying on error
///
/// # Examples
/// ```rust
/// use outflow::core::retry::{retry_async, RetryPolicy};
///
/// # async fn example() -> Result<String, String> {
/// let result = retry_async(
///     "endpoint_check",
///     RetryPolicy::default(),
///     || async { Ok::<String, String>("ok".to_string()) },
/// ).await?;
/// # Ok(result)
/// # }
/// ```
pub async fn retry_async<F, T, E, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if attempt >= attempts => return Err(error),
            Err(error) => {
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    attempts,
                    policy.delay,
                    error
                );
                sleep(policy.delay).await;
            }
        }
    }
}
