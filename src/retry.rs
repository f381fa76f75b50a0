//! Bounded timeout and retry for network calls.
//!
//! Every registry and issuer call is a network operation that may suspend.
//! [`with_retries`] wraps one call site with a per-attempt deadline and a
//! small number of exponential-backoff retries for transient errors. Retry
//! safety is the caller's responsibility: the rotation protocol only routes
//! idempotent steps through this helper.

use crate::{KeysweepError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Timeout, attempt, and backoff bounds for a network call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
    /// Deadline applied to each individual attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; each call still runs under the timeout.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Sets the total number of attempts (clamped to at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial backoff delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the per-attempt deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Backoff delay before the retry following `attempt` (0-indexed).
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Runs `call` under the policy's deadline, retrying transient failures with
/// exponential backoff.
///
/// Non-transient errors propagate immediately. When attempts are exhausted
/// the last error is returned. `operation` labels log lines and timeout
/// errors.
///
/// # Example
///
/// ```
/// use keysweep::retry::{with_retries, RetryPolicy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> keysweep::Result<()> {
/// let policy = RetryPolicy::default();
/// let value = with_retries(&policy, "example", || async { Ok(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_retries<T, Fut, F>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        let result = match timeout(policy.call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(KeysweepError::Timeout(format!(
                "{} exceeded {:?}",
                operation, policy.call_timeout
            ))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                debug!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky(failures: u32, calls: &AtomicU32) -> Result<u32> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            Err(KeysweepError::Unavailable("injected".to_string()))
        } else {
            Ok(n)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = with_retries(&policy, "test", || async { flaky(2, &calls) }).await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_max_attempts(2);

        let result = with_retries(&policy, "test", || async { flaky(5, &calls) }).await;

        assert!(matches!(result, Err(KeysweepError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<()> = with_retries(&policy, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(KeysweepError::RecordNotFound("item-1".to_string()))
        })
        .await;

        assert!(matches!(result, Err(KeysweepError::RecordNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient_and_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default()
            .with_max_attempts(2)
            .with_call_timeout(Duration::from_millis(50));

        let result: Result<()> = with_retries(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(KeysweepError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(10),
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(1), Duration::from_millis(400));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
        assert_eq!(policy.delay_for(3), Duration::from_secs(1));
        assert_eq!(policy.delay_for(8), Duration::from_secs(1));
    }

    #[test]
    fn test_attempts_clamped_to_one() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }
}
