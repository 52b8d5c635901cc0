//! Retry policy and error classification for provider API calls.

use reqwest::StatusCode;
use std::time::Duration;

/// Default number of attempts for a provider request.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default base delay in milliseconds, doubled after every failed attempt.
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 500;

/// Bounded exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_BACKOFF_MS)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::from_millis(base_backoff_ms),
        }
    }

    /// Number of attempts actually made. A request is always sent at least once.
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the attempt at `attempt_index` (starting at 0) failed.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt_index))
    }
}

/// Errors that should not be retried.
#[derive(Debug)]
pub enum NonRetryableError {
    /// Provider rejected the credentials (HTTP 401 / 403)
    AuthenticationFailed(String),
    /// Provider rejected the payload or recipient (HTTP 400 / 422)
    InvalidRequest(String),
    /// Other client errors that won't succeed on retry
    ClientError(String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}. Check the provider API key.", msg)
            }
            NonRetryableError::InvalidRequest(msg) => {
                write!(f, "Request rejected: {}", msg)
            }
            NonRetryableError::ClientError(msg) => {
                write!(f, "Request error: {}", msg)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// A non-success status that is worth retrying (5xx, 429).
#[derive(Debug)]
pub struct StatusError {
    pub status: StatusCode,
    pub body: String,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.body.is_empty() {
            write!(f, "HTTP {}", self.status)
        } else {
            write!(f, "HTTP {}: {}", self.status, self.body)
        }
    }
}

impl std::error::Error for StatusError {}

fn describe(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {} ({})", status.as_u16(), body)
    }
}

/// Classifies a non-success status as retryable or not.
/// Returns Ok(()) if the request may be retried.
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), NonRetryableError> {
    match status {
        // Rate limiting clears up on its own
        StatusCode::TOO_MANY_REQUESTS => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
            NonRetryableError::AuthenticationFailed(describe(status, body)),
        ),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(NonRetryableError::InvalidRequest(describe(status, body)))
        }
        s if s.is_client_error() => Err(NonRetryableError::ClientError(describe(status, body))),
        _ => Ok(()),
    }
}

/// Converts a non-success response into the error carried by the retry loop.
pub fn check_status(status: StatusCode, body: String) -> anyhow::Error {
    match classify_status(status, &body) {
        Ok(()) => anyhow::Error::from(StatusError { status, body }),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}

/// Anything not explicitly classified as terminal is retried:
/// transport failures, timeouts, 5xx and 429.
pub fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}
