//! Retrying provider calls that failed for a transient reason.
//!
//! What counts as transient is decided by
//! [`Error::is_transient`](crate::Error::is_transient): rate limits, server
//! errors, timeouts and dropped connections. Anything else fails at once.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::Result;

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// How often, and how patiently, a provider call is repeated.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first failure. `0` disables retrying.
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each one after it.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    fn wait_before(&self, retry: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(MAX_BACKOFF)
    }
}

/// Await `op`, calling it again after a transient error while retries
/// remain. `what` labels the warning logged before each retry.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if retry < config.max_retries && e.is_transient() => {
                let wait = config.wait_before(retry);
                retry += 1;
                warn!(
                    "{what}: {e}; retry {retry}/{} in {:.1}s",
                    config.max_retries,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::Error;

    fn http(status: u16) -> Error {
        Error::Http {
            provider: "OpenAI",
            status,
            body: String::new(),
        }
    }

    fn immediate(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn unavailable_then_ok_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&immediate(2), "complete", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(http(503))
                } else {
                    Ok("reply")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "reply");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(&immediate(3), "complete", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(http(400)) }
        })
        .await;
        assert!(matches!(result, Err(Error::Http { status: 400, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn last_transient_error_is_returned() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(&immediate(2), "complete", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(http(429)) }
        })
        .await;
        assert!(matches!(result, Err(Error::Http { status: 429, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn disabled_retries_call_once() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(&RetryConfig::default(), "complete", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(http(500)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let config = RetryConfig {
            max_retries: 10,
            backoff: Duration::from_secs(1),
        };
        assert_eq!(config.wait_before(0), Duration::from_secs(1));
        assert_eq!(config.wait_before(2), Duration::from_secs(4));
        assert_eq!(config.wait_before(9), MAX_BACKOFF);
    }
}
