//! Bounded retry with exponential backoff
//!
//! One combinator shared by plan generation, booking dispatch and enrichment.
//! The error type decides whether another attempt is worthwhile through the
//! [`Retryable`] trait; the policy decides how many attempts and how long to wait.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classifies an error as worth retrying or fatal
pub trait Retryable {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Server-provided minimum wait before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// How many attempts to make and how long to wait between them
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_backoff: Duration,

    /// Upper bound for any single delay
    pub max_backoff: Duration,

    /// Growth factor applied per attempt
    pub multiplier: u32,

    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from millisecond settings
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
            ..Self::default()
        }
    }

    /// Policy with no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 2,
            jitter: false,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt, before jitter
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.max(1).saturating_pow(exp);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff_for(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let spread = (base.as_millis() as u64 / 4).max(1);
        base + Duration::from_millis(rand::rng().random_range(0..=spread))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts. `op` receives the 1-based attempt number.
///
/// The last error is returned unchanged when attempts are exhausted.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    debug!(%label, max_attempts = policy.max_attempts, "retry: called");
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(%label, attempt, "retry: succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                debug!(%label, attempt, error = %e, "retry: fatal error");
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(%label, attempt, error = %e, "retry: attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                let mut delay = policy.delay_for(attempt);
                if let Some(after) = e.retry_after() {
                    delay = delay.max(after);
                }
                warn!(%label, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retry: transient error, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(5, 100, 350);
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(30), Duration::from_millis(350));
    }

    #[test]
    fn test_new_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, 10, 10).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestError> = retry(&RetryPolicy::immediate(3), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(TestError::Transient)
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_fatal() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(&RetryPolicy::immediate(5), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Fatal) }
        })
        .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(&RetryPolicy::immediate(4), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Transient) }
        })
        .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
