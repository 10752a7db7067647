//! Retry with exponential backoff for unreliable upstream calls
//!
//! Failures classify themselves through [`Classify`]. Parse failures (the
//! output could not be interpreted as structured data) get the full retry
//! budget; other failures are retried at most twice; fatal failures are
//! returned immediately. The schedule is deterministic: no jitter is added.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

/// How a failure should be treated by [`RetryPolicy::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Output was not well-formed structured data; retried up to `max_retries`
    Parse,
    /// Anything else that might be transient; retried up to `min(2, max_retries)`
    Other,
    /// Never retried (missing credentials, cancellation)
    Fatal,
}

/// Implemented by error types that can be retried
pub trait Classify {
    fn failure_class(&self) -> FailureClass;
}

/// Cap on retries for failures outside the parse tier
const OTHER_FAILURE_RETRY_CAP: u32 = 2;

/// Exponential backoff schedule with capped attempts and capped delay
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (0-indexed)
    ///
    /// `min(base_delay * backoff_factor^attempt, max_delay)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        let max = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= max {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Number of retries allowed for a failure of the given class
    pub fn retries_for(&self, class: FailureClass) -> u32 {
        match class {
            FailureClass::Parse => self.max_retries,
            FailureClass::Other => self.max_retries.min(OTHER_FAILURE_RETRY_CAP),
            FailureClass::Fatal => 0,
        }
    }

    /// Run `op` until it succeeds or its failure class runs out of retries
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, E>
    where
        E: Classify + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_observed(operation, |_, _, _| {}, op).await
    }

    /// Like [`RetryPolicy::run`], calling `on_retry(attempt, delay, error)`
    /// before each backoff sleep
    pub async fn run_observed<T, E, F, Fut, O>(&self, operation: &str, mut on_retry: O, mut op: F) -> Result<T, E>
    where
        E: Classify + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        O: FnMut(u32, Duration, &E),
    {
        debug!(%operation, max_retries = self.max_retries, "run: called");
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    debug!(%operation, attempt, "run: succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    let class = e.failure_class();
                    if attempt >= self.retries_for(class) {
                        error!(%operation, attempt = attempt + 1, ?class, error = %e, "run: giving up");
                        return Err(e);
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        %operation,
                        attempt = attempt + 1,
                        total = self.max_retries + 1,
                        ?class,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "run: retrying after failure"
                    );
                    on_retry(attempt + 1, delay, &e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    enum TestError {
        #[error("parse failure #{0}")]
        Parse(u32),
        #[error("network failure #{0}")]
        Network(u32),
        #[error("fatal")]
        Fatal,
    }

    impl Classify for TestError {
        fn failure_class(&self) -> FailureClass {
            match self {
                TestError::Parse(_) => FailureClass::Parse,
                TestError::Network(_) => FailureClass::Other,
                TestError::Fatal => FailureClass::Fatal,
            }
        }
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        // Delay before attempt k (k >= 1) is min(2^(k-1), 30) seconds
        for k in 1..=10u32 {
            let expected = 2f64.powi(k as i32 - 1).min(30.0);
            assert_eq!(policy.delay_after(k - 1), Duration::from_secs_f64(expected), "attempt {k}");
        }
    }

    #[test]
    fn test_delay_is_capped_for_huge_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(10_000), Duration::from_secs(30));
    }

    #[test]
    fn test_retries_for() {
        assert_eq!(fast(5).retries_for(FailureClass::Parse), 5);
        assert_eq!(fast(5).retries_for(FailureClass::Other), 2);
        assert_eq!(fast(1).retries_for(FailureClass::Other), 1);
        assert_eq!(fast(5).retries_for(FailureClass::Fatal), 0);
    }

    #[tokio::test]
    async fn test_parse_failures_exhaust_full_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast(5)
            .run("parse", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(TestError::Parse(n))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(result, Err(TestError::Parse(6)));
    }

    #[tokio::test]
    async fn test_other_failures_retried_twice() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast(5)
            .run("network", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(TestError::Network(n))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result, Err(TestError::Network(3)));
    }

    #[tokio::test]
    async fn test_fatal_failure_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast(5)
            .run("fatal", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Err(TestError::Fatal));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast(5)
            .run("flaky", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(TestError::Parse(n)) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestError> = fast(0)
            .run("once", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Parse(1))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observer_sees_each_retry() {
        let mut seen = Vec::new();
        let _: Result<(), TestError> = fast(3)
            .run_observed(
                "observed",
                |attempt, delay, e: &TestError| seen.push((attempt, delay, e.to_string())),
                || async { Err(TestError::Parse(0)) },
            )
            .await;

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[0].1, Duration::from_millis(1));
        assert_eq!(seen[2].1, Duration::from_millis(4));
    }
}
