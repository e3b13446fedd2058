//! Bounded retry with deterministic backoff.
//!
//! Wraps a single carrier call with a fixed retry budget. Only failures
//! classified `Unavailable` are retried; a semantically rejected request
//! cannot succeed on retry and would only waste the budget masking a
//! real error.
//!
//! Delays are produced by the policy and executed through an injected
//! [`Sleeper`], so unit tests run synchronously against a recording
//! implementation instead of waiting on the wall clock.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderFailure};

// =============================================================================
// Sleeper
// =============================================================================

/// Delay executor injected into the retry loop.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: std::sync::Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Create a new recording sleeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Backoff shape between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Delay grows linearly: `base * attempt`
    Linear,
    /// Delay doubles each attempt: `base * 2^(attempt-1)`
    Exponential,
}

/// Retry policy for carrier calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget (first call included)
    pub max_attempts: u32,
    /// Base delay for backoff calculations
    pub base_delay: Duration,
    /// Cap applied to every computed delay
    pub max_delay: Duration,
    /// Backoff shape
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after a failed attempt (1-indexed).
    ///
    /// Deterministic on purpose: no jitter, so tests can assert the
    /// exact schedule.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.base_delay * attempt,
            // Shift capped so the multiplier cannot overflow
            Backoff::Exponential => self.base_delay * (1u32 << (attempt - 1).min(16)),
        };
        delay.min(self.max_delay)
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Executes a single carrier call under the retry policy.
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    /// Create an executor with the tokio sleeper.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    /// Create an executor with an injected sleeper (tests).
    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds, fails permanently, or the attempt
    /// budget is spent.
    ///
    /// # Errors
    ///
    /// - `ProviderFailure::Permanent` for `Rejected`/`NotFound`, after a
    ///   single attempt
    /// - `ProviderFailure::Exhausted` wrapping the last underlying error
    ///   once `max_attempts` transient failures accumulated
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        mut call: F,
    ) -> Result<T, ProviderFailure>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ProviderError>> + Send,
    {
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Carrier call succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    if attempt >= self.policy.max_attempts {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "Retry budget exhausted"
                        );
                        return Err(ProviderFailure::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }

                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient carrier failure, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(operation, error = %err, "Permanent carrier failure, not retrying");
                    return Err(ProviderFailure::Permanent(err));
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor(policy: RetryPolicy) -> (RetryExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        (
            RetryExecutor::with_sleeper(policy, sleeper.clone()),
            sleeper,
        )
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt_without_sleeping() {
        let (executor, sleeper) = executor(RetryPolicy::default());

        let result: Result<u32, _> = executor.execute("op", || async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_then_success_within_budget() {
        let (executor, sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        // Fails transiently exactly N-1 times, then succeeds
        let result = executor
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::Unavailable("503".to_string()))
                    } else {
                        Ok("D123")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "D123");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausts_budget_after_exactly_max_attempts() {
        let (executor, sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Unavailable("timeout".to_string())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Sleeps happen between attempts, never after the last one
        assert_eq!(sleeper.recorded().len(), 2);
        match result.unwrap_err() {
            ProviderFailure::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, ProviderError::Unavailable(_)));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_is_never_retried() {
        let (executor, sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Rejected("bad address".to_string())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
        assert!(matches!(
            result.unwrap_err(),
            ProviderFailure::Permanent(ProviderError::Rejected(_))
        ));
    }

    #[test]
    fn test_linear_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Linear,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_backoff_schedule_with_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            backoff: Backoff::Exponential,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        // Capped
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_millis(500));
    }
}
