use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// A bounded retry loop shared by every caller that re-attempts a fallible
/// async operation: attempt budget, base delay, backoff factor, and a
/// caller-supplied predicate deciding which errors are worth another try.
///
/// The chat pipeline uses the fixed-delay form; `exponential` is available
/// for callers that want growing delays.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: f64,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: 1.0,
        }
    }

    pub fn exponential(max_attempts: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            max_attempts,
            delay,
            backoff,
        }
    }

    fn delay_for(&self, completed_attempts: u32) -> Duration {
        self.delay
            .mul_f64(self.backoff.powi(completed_attempts.saturating_sub(1) as i32))
    }

    /// Run `op` until it succeeds, the error is declared non-retryable, or
    /// the attempt budget is spent. The last error is returned as-is.
    pub async fn run<T, E, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
        mut retryable: impl FnMut(&E) -> bool,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !retryable(&err) {
                        return Err(err);
                    }
                    warn!(attempt, error = %err, "attempt failed, retrying after delay");
                    tokio::time::sleep(self.delay_for(attempt)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ApiError, LlmError};
    use std::cell::Cell;

    fn api_error(code: u16) -> LlmError {
        LlmError::Api(ApiError {
            code,
            message: "err".to_string(),
            metadata: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn transient_code_uses_full_attempt_budget() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(2000));
        let calls = Cell::new(0u32);

        let result: Result<(), _> = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err(api_error(408)) }
                },
                LlmError::is_retryable,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn terminal_code_stops_after_first_attempt() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(2000));
        let calls = Cell::new(0u32);

        let result: Result<(), _> = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err(api_error(401)) }
                },
                LlmError::is_retryable,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_op_recovers() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(100));
        let calls = Cell::new(0u32);

        let result = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n < 3 {
                            Err(api_error(502))
                        } else {
                            Ok("recovered")
                        }
                    }
                },
                LlmError::is_retryable,
            )
            .await
            .unwrap();

        assert_eq!(result, "recovered");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_policy_waits_the_same_delay_between_attempts() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(2000));
        let start = tokio::time::Instant::now();

        let _: Result<(), _> = policy
            .run(|| async { Err(api_error(503)) }, LlmError::is_retryable)
            .await;

        // Two delays between three attempts.
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_policy_grows_the_delay() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(1000), 2.0);
        let start = tokio::time::Instant::now();

        let _: Result<(), String> = policy
            .run(|| async { Err("transient".to_string()) }, |_| true)
            .await;

        // 1s after the first failure, 2s after the second.
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }
}
