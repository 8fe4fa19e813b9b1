// SPDX-FileCopyrightText: 2026 Engram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reusable retry policy with exponential backoff.
//!
//! Applied explicitly at call sites (scoring requests, summary
//! completions) rather than wrapping clients, so each caller decides
//! what exhaustion means for it.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Max attempts plus exponential backoff between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each retry after that.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Backoff before retry number `retry` (1-based): base * 2^(retry-1),
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }

    /// Run `op` up to `max_attempts` times, sleeping between attempts.
    /// Returns the first success, or the last error once exhausted.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        error!(%what, attempts = attempt, error = %err, "retries exhausted");
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt);
                    warn!(%what, attempt, ?delay, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(500),
            Duration::from_secs(2),
        );
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_secs(2));
        assert_eq!(policy.delay_for(10), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<u32, String> = policy
            .run("test-op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<u32, String> = policy
            .run("test-op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(
            3,
            Duration::from_millis(10),
            Duration::from_millis(100),
        );
        let result: Result<u32, String> = policy
            .run("test-op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {n}")) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn max_attempts_floor_of_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        let result: Result<(), String> = policy
            .run("test-op", || async { Err("boom".to_string()) })
            .await;
        assert!(result.is_err());
    }
}
