//! Retry policy for collaborator calls.
//!
//! Collaborators get one attempt plus at most one retry. The pause before the
//! retry is the fixed backoff, stretched to a provider's retry hint when one
//! is given but never beyond `max_wait`. Anything beyond that is reported
//! upward.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently to repeat a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Pause before each repeat.
    pub backoff: Duration,
    /// Longest pause a retry hint may ask for.
    pub max_wait: Duration,
}

/// Cap on hinted pauses unless configured otherwise.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

impl RetryPolicy {
    /// One attempt and one retry after `backoff`.
    #[must_use]
    pub const fn once(backoff: Duration) -> Self {
        Self {
            max_attempts: 2,
            backoff,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// A single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    /// Caps the pause a retry hint can request.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Pause before repeating after an error carrying `hint`.
    fn pause(&self, hint: Option<Duration>) -> Duration {
        hint.map_or(self.backoff, |hint| hint.max(self.backoff))
            .min(self.max_wait.max(self.backoff))
    }

    /// Runs `op`, repeating it while `retryable` accepts the error and
    /// attempts remain.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        retryable: impl Fn(&E) -> bool,
        op: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_hint(operation, retryable, |_| None, op).await
    }

    /// Like [`RetryPolicy::run`], but waits as long as `hint` asks for
    /// (within `max_wait`) when the error carries a retry hint.
    pub async fn run_with_hint<T, E, F, Fut>(
        &self,
        operation: &str,
        retryable: impl Fn(&E) -> bool,
        hint: impl Fn(&E) -> Option<Duration>,
        mut op: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    let pause = self.pause(hint(&e));
                    tracing::warn!(
                        operation,
                        attempt,
                        pause_ms = pause.as_millis() as u64,
                        error = %e,
                        "collaborator call failed, retrying"
                    );
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once(Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::once(Duration::ZERO);

        let result = policy
            .run("test", LlmError::is_retryable, move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(LlmError::Timeout)
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::once(Duration::ZERO);

        let result: Result<(), _> = policy
            .run("test", LlmError::is_retryable, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::Timeout)
            })
            .await;

        assert_eq!(result, Err(LlmError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pause_honors_hint_within_cap() {
        let policy =
            RetryPolicy::once(Duration::from_millis(500)).with_max_wait(Duration::from_secs(5));

        assert_eq!(policy.pause(None), Duration::from_millis(500));
        assert_eq!(policy.pause(Some(Duration::from_secs(2))), Duration::from_secs(2));
        assert_eq!(policy.pause(Some(Duration::from_secs(60))), Duration::from_secs(5));
        assert_eq!(policy.pause(Some(Duration::ZERO)), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn rate_limit_hint_delays_the_retry_up_to_the_cap() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::once(Duration::ZERO).with_max_wait(Duration::from_millis(150));
        let started = std::time::Instant::now();

        let result = policy
            .run_with_hint(
                "test",
                LlmError::is_retryable,
                LlmError::retry_after,
                move || async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(LlmError::RateLimited {
                            retry_after_secs: Some(60),
                        })
                    } else {
                        Ok("done")
                    }
                },
            )
            .await;

        assert_eq!(result, Ok("done"));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(150));
        assert!(waited < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn non_retryable_error_is_returned_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .run("test", LlmError::is_retryable, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::ResponseParseFailed {
                    reason: "bad json".into(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
