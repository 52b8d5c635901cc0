//! HTTP client module with retry logic and error classification.

mod client;
mod retry;

pub use client::HttpClient;
pub use retry::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, NonRetryableError, RetryPolicy, StatusError,
    check_status, classify_status, is_retryable_error,
};
