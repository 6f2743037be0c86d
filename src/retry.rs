//! Bounded retry with linear backoff.
//!
//! Before attempt `n` (1-based, counting retries only) the loop sleeps
//! `delay_ms * n`: with the defaults that is 1 s, then 2 s. The last error
//! is returned unchanged once `max_retries` retries have failed.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 2.
    pub max_retries: u32,
    /// Base delay; the wait before retry `n` is `delay_ms * n`. Default: 1000.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            delay_ms,
        }
    }

    /// Total attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        Duration::from_millis(self.delay_ms.saturating_mul(retry as u64))
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `op` receives the 0-based attempt number.
pub async fn retry_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ConvertError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ConvertError>>,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let backoff = policy.delay_for(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{}: succeeded on attempt {}", label, attempt + 1);
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_retries => {
                warn!("{}: giving up after {} attempt(s): {}", label, attempt + 1, e);
                return Err(e);
            }
            Err(e) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, 1)
    }

    #[test]
    fn defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries, 2);
        assert_eq!(p.delay_ms, 1000);
        assert_eq!(p.max_attempts(), 3);
    }

    #[test]
    fn backoff_is_linear() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(1), Duration::from_millis(1000));
        assert_eq!(p.delay_for(2), Duration::from_millis(2000));
        assert_eq!(p.delay_for(3), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn always_failing_op_runs_max_retries_plus_one_times() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_policy(fast(2), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ConvertError::Internal("boom".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ConvertError::Internal(ref m)) if m == "boom"));
    }

    #[tokio::test]
    async fn succeeds_on_kth_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_with_policy(fast(2), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 1 {
                    Err(ConvertError::Internal("transient".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let calls = AtomicU32::new(0);
        let _ = retry_with_policy(fast(0), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ConvertError::Internal("x".into())) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_retry_means_two_calls() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_policy(fast(1), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ConvertError::Internal("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn last_error_is_returned() {
        let result: Result<(), _> = retry_with_policy(fast(2), "test", |attempt| async move {
            Err(ConvertError::Internal(format!("attempt {attempt}")))
        })
        .await;
        assert!(matches!(result, Err(ConvertError::Internal(ref m)) if m == "attempt 2"));
    }
}
