use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::PilotResult;

/// Bounded retry with exponential backoff: attempt `n` (0-based) that fails
/// sleeps `backoff_seconds * 2^n` before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_seconds: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_seconds: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_seconds: 0.0,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.backoff_seconds.max(0.0) * 2f64.powi(attempt.min(16) as i32);
        Duration::from_secs_f64(secs)
    }
}

/// Runs `op` until it succeeds or the policy is exhausted; returns the last error.
pub async fn attempt_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> PilotResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = PilotResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    op = label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(op = label, attempts = attempt + 1, error = %e, "retries exhausted");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PilotError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy { max_retries: 3, backoff_seconds: 0.5 };
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy { max_retries: 2, backoff_seconds: 0.0 };
        let result = attempt_with_backoff(&policy, "flaky", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(PilotError::Executor("transient".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: PilotResult<()> = attempt_with_backoff(&RetryPolicy { max_retries: 1, backoff_seconds: 0.0 }, "dead", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PilotError::Executor("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
