//! Retry decorator for adapter calls
//!
//! Only transient kinds (`RateLimited`, `Timeout`) are retried. The delay
//! before attempt `n + 1` is `base * 2^n`, capped at `max_delay`; a
//! provider's `Retry-After` is honoured when larger, still under the cap.

use crate::ports::provider_adapter::AdapterError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Delay before the retry following failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32, error: &AdapterError) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let exponential = self.base_delay.saturating_mul(factor).min(self.max_delay);
        match error.retry_after() {
            Some(requested) => requested.max(exponential).min(self.max_delay),
            None => exponential,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// Returns the final outcome and the number of attempts made.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> (Result<T, AdapterError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return (Ok(value), attempt + 1),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let wait = self.delay_for(attempt, &e);
                    debug!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        wait_ms = wait.as_millis() as u64,
                        "Retrying adapter call"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return (Err(e), attempt + 1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use ultra_domain::ProviderErrorKind;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(2)
            .with_backoff(Duration::from_millis(100), Duration::from_millis(300))
    }

    #[test]
    fn test_delay_is_exponential_and_capped() {
        let p = policy();
        let e = AdapterError::Timeout("slow".into());
        assert_eq!(p.delay_for(0, &e), Duration::from_millis(100));
        assert_eq!(p.delay_for(1, &e), Duration::from_millis(200));
        assert_eq!(p.delay_for(2, &e), Duration::from_millis(300));
        assert_eq!(p.delay_for(40, &e), Duration::from_millis(300));
    }

    #[test]
    fn test_retry_after_honoured_but_capped() {
        let p = policy();
        let short = AdapterError::rate_limited("429", Some(Duration::from_millis(250)));
        assert_eq!(p.delay_for(0, &short), Duration::from_millis(250));
        let long = AdapterError::rate_limited("429", Some(Duration::from_secs(60)));
        assert_eq!(p.delay_for(0, &long), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let (result, attempts) = policy()
            .run(|| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AdapterError::Timeout("slow".into()))
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_bound() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let (result, attempts) = policy()
            .run(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AdapterError::rate_limited("429", None))
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), ProviderErrorKind::RateLimited);
        assert_eq!(attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let (result, attempts) = policy()
            .run(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AdapterError::Auth("bad key".into()))
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), ProviderErrorKind::Auth);
        assert_eq!(attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
