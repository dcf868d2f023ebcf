//! HTTP error classification and bounded retry.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the GitHub and Asana clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Request URL.
        url: String,
        /// Response body, possibly truncated by the server.
        body: String,
    },

    /// Transport-level failure (connect, timeout).
    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A resolved value does not fit the target field schema.
    #[error("Field coercion error: {0}")]
    Coerce(String),
}

impl ApiError {
    /// Whether a retry can reasonably succeed: 429, any 5xx, or a
    /// timeout/connect failure. Other client errors never retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            ApiError::Transport(e) => e.is_timeout() || e.is_connect(),
            ApiError::Decode(_) | ApiError::Coerce(_) => false,
        }
    }
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound for the doubling delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Run an operation under the policy, retrying retryable failures with
/// doubling delays. The last error is returned once attempts run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && e.is_retryable() => {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, policy.max_delay);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(operation, attempt, error = %e, "Request failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn status_error(status: u16) -> ApiError {
        ApiError::Status {
            status,
            url: "https://example.com".to_string(),
            body: String::new(),
        }
    }

    fn tiny_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(status_error(429).is_retryable());
        assert!(status_error(500).is_retryable());
        assert!(status_error(503).is_retryable());
        assert!(!status_error(400).is_retryable());
        assert!(!status_error(404).is_retryable());
        assert!(!status_error(422).is_retryable());
        assert!(!ApiError::Decode("bad json".to_string()).is_retryable());
        assert!(!ApiError::Coerce("bad value".to_string()).is_retryable());
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let attempts = Cell::new(0u32);
        let result = with_retry(&tiny_policy(), "test", || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n < 3 {
                    Err(status_error(503))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_attempts() {
        let attempts = Cell::new(0u32);
        let result: Result<(), ApiError> = with_retry(&tiny_policy(), "test", || {
            attempts.set(attempts.get() + 1);
            async { Err(status_error(429)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn test_with_retry_fails_fast_on_client_error() {
        let attempts = Cell::new(0u32);
        let result: Result<(), ApiError> = with_retry(&tiny_policy(), "test", || {
            attempts.set(attempts.get() + 1);
            async { Err(status_error(404)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }
}
