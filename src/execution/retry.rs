use std::future::Future;
use std::time::Duration;

use crate::exchange::ExchangeError;

/// Bounded retry for exchange calls. Only transport failures are retried;
/// a rejection is final on the first answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(3_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Runs `op` until it succeeds, is rejected, or attempts run out.
    /// A returned `Transport` error means every attempt failed.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, ExchangeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(ExchangeError::Transport(cause)) if attempt <= self.max_retries => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts(),
                        error = %cause,
                        "Transport failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_transport_retried_until_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let result: Result<(), _> = policy
            .run("ticker", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExchangeError::Transport("timeout".into())) }
            })
            .await;
        assert!(matches!(result, Err(ExchangeError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run("entry", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExchangeError::rejected("40001", "insufficient balance")) }
            })
            .await;
        assert!(matches!(result, Err(ExchangeError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::default()
            .run("entry", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ExchangeError::Transport("reset".into()))
                    } else {
                        Ok("order-1")
                    }
                }
            })
            .await;
        assert_eq!(result, Ok("order-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_policy_single_attempt() {
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = RetryPolicy::none()
            .run("entry", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ExchangeError::Transport("down".into())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
