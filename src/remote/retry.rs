//! Bounded retry with capped exponential backoff.
//!
//! Rate-limit responses honor the remote's retry-after hint; other transient
//! failures back off exponentially with a deterministic jitter. Permanent
//! failures return immediately.

use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Retry policy shared by the snapshot fetcher and the apply executor.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff delay before the given retry (1-based attempt
    /// that just failed), including jitter.
    #[must_use]
    pub fn backoff_delay(&self, label: &str, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(1_u64 << attempt.min(16))
            .min(self.max_delay_ms);
        // Deterministic jitter in [0, exponential/2): enough to spread
        // concurrent retries without an RNG.
        let jitter = if exponential > 1 {
            jitter_source(label, attempt) % (exponential / 2).max(1)
        } else {
            0
        };
        Duration::from_millis(exponential + jitter)
    }
}

/// Runs a fallible async call under the given retry policy.
///
/// Returns the final result together with the number of attempts made. The
/// caller decides how to report exhaustion (`attempts == max_attempts` with
/// an error result).
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut call: F,
) -> (Result<T>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match call().await {
            Ok(value) => return (Ok(value), attempt),
            Err(err) => {
                if !err.is_retryable() || attempt >= policy.max_attempts {
                    return (Err(err), attempt);
                }

                let delay = err.retry_delay_secs().map_or_else(
                    || policy.backoff_delay(label, attempt),
                    Duration::from_secs,
                );
                debug!(
                    "{label}: attempt {attempt}/{} failed ({err}), retrying in {delay:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Returns true if the error-with-attempts pair means retries were
/// exhausted rather than a permanent failure.
#[must_use]
pub(crate) const fn is_exhausted(err: &SyncError, attempts: u32, policy: RetryPolicy) -> bool {
    err.is_retryable() && attempts >= policy.max_attempts
}

fn jitter_source(label: &str, attempt: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update(attempt.to_be_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let (result, attempts) =
            with_retry(quick_policy(), "test", || async { Ok::<_, SyncError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_transient_errors_retried() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = with_retry(quick_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(RemoteError::network("flaky").into())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = with_retry(quick_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<u32, _>(
                    RemoteError::AuthenticationFailed {
                        message: String::from("bad token"),
                    }
                    .into(),
                )
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_attempts() {
        let policy = quick_policy();
        let (result, attempts) = with_retry(policy, "test", || async {
            Err::<u32, _>(RemoteError::network("down").into())
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(attempts, 3);
        assert!(is_exhausted(&err, attempts, policy));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        let delay = policy.backoff_delay("x", 9);
        assert!(delay <= Duration::from_millis(1_500));
    }

    #[test]
    fn test_jitter_deterministic() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay("a", 2), policy.backoff_delay("a", 2));
    }
}
