//! Retry utilities with exponential backoff for resilient API calls.

use std::time::Duration;
use tokio::time::sleep;

use crate::capabilities::CapabilityError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts (1 = no retries)
    pub max_attempts: u32,
    /// Initial delay between attempts
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Retry configuration used for search batch requests
pub fn search_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.0,
    }
}

/// A single attempt, no retries. Default policy for per-record enrichment.
pub fn single_attempt() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        ..Default::default()
    }
}

/// Whether an error is worth retrying
pub fn is_transient(error: &CapabilityError) -> bool {
    matches!(
        error,
        CapabilityError::Network(_)
            | CapabilityError::Timeout
            | CapabilityError::RateLimit
            | CapabilityError::Unavailable(_)
    )
}

/// Result of a retried operation, distinguishing how it failed
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// Operation succeeded
    Success(T),
    /// Every attempt failed with a transient error
    TransientExhausted(CapabilityError, u32),
    /// Operation failed with a permanent error (no retry issued)
    Permanent(CapabilityError),
}

/// Delay before the next attempt. Rate-limit errors get a floor so backoff
/// never hammers a throttling upstream.
fn backoff_delay(config: &RetryConfig, attempt: u32, error: &CapabilityError) -> Duration {
    let exp = config.initial_delay.as_secs_f64()
        * config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
    let delay = Duration::from_secs_f64(exp.min(config.max_delay.as_secs_f64()));
    match error {
        CapabilityError::RateLimit => delay.max(Duration::from_secs(1)),
        _ => delay,
    }
}

/// Execute an async operation with bounded retries and exponential backoff
///
/// Transient errors (network, timeout, rate limit, 5xx) are retried up to
/// `config.max_attempts`; permanent errors return immediately.
pub async fn with_retry_detailed<T, F, Fut>(config: RetryConfig, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after transient failures");
                }
                return RetryOutcome::Success(result);
            }
            Err(error) if is_transient(&error) => {
                if attempt >= config.max_attempts {
                    tracing::warn!(attempt, %error, "giving up after transient failures");
                    return RetryOutcome::TransientExhausted(error, attempt);
                }

                let delay = backoff_delay(&config, attempt, &error);
                tracing::debug!(attempt, %error, ?delay, "transient failure, retrying");
                sleep(delay).await;
            }
            Err(error) => {
                return RetryOutcome::Permanent(error);
            }
        }
    }
}

/// Like [`with_retry_detailed`] but flattens the outcome into a `Result`
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CapabilityError>>,
{
    match with_retry_detailed(config, operation).await {
        RetryOutcome::Success(value) => Ok(value),
        RetryOutcome::TransientExhausted(error, _) | RetryOutcome::Permanent(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = {
            let calls = calls.clone();
            with_retry(fast_config(3), move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("ok")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = {
            let calls = calls.clone();
            with_retry(fast_config(4), move || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(CapabilityError::Network("connection reset".to_string()))
                    } else {
                        Ok("ok")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: RetryOutcome<()> = {
            let calls = calls.clone();
            with_retry_detailed(fast_config(5), move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CapabilityError::Rejected("malformed query".to_string()))
                }
            })
        }
        .await;

        assert!(matches!(outcome, RetryOutcome::Permanent(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_exhaustion_reports_attempts() {
        let outcome: RetryOutcome<()> = with_retry_detailed(fast_config(3), || async {
            Err(CapabilityError::Timeout)
        })
        .await;

        match outcome {
            RetryOutcome::TransientExhausted(CapabilityError::Timeout, attempts) => {
                assert_eq!(attempts, 3)
            }
            other => panic!("expected transient exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&CapabilityError::Timeout));
        assert!(is_transient(&CapabilityError::RateLimit));
        assert!(is_transient(&CapabilityError::Network("x".into())));
        assert!(is_transient(&CapabilityError::Unavailable("x".into())));
        assert!(!is_transient(&CapabilityError::Rejected("x".into())));
        assert!(!is_transient(&CapabilityError::Parse("x".into())));
        assert!(!is_transient(&CapabilityError::NotAvailable("x".into())));
    }
}
