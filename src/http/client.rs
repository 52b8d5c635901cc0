//! HTTP client with bounded exponential-backoff retry.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{Client, header::HeaderMap};
use serde::Serialize;
use std::time::Duration;

use super::retry::{RetryPolicy, check_status, is_retryable_error};

/// HTTP client with built-in retry logic for provider API calls.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// POSTs `payload` as JSON and returns the response body of the first
    /// successful attempt. Client errors other than 429 fail without retry.
    #[tracing::instrument(skip(self, payload, headers))]
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &B,
        headers: &HeaderMap,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<String> {
        debug!("POST JSON to {}...", url);

        self.with_retry("POST JSON", policy, || async {
            let response = self
                .client
                .post(url)
                .headers(headers.clone())
                .timeout(timeout)
                .json(payload)
                .send()
                .await
                .context("Failed to send request")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(check_status(status, body));
            }

            // The request went through; an unreadable body must not trigger a resend.
            Ok(response.text().await.unwrap_or_else(|e| {
                debug!("Failed to read response body: {}", e);
                String::new()
            }))
        })
        .await
    }

    /// Executes an async operation, sleeping `policy.delay_for(n)` after the
    /// n-th retryable failure.
    async fn with_retry<F, Fut, T>(
        &self,
        operation_name: &str,
        policy: RetryPolicy,
        operation: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let attempts = policy.attempts();
        let mut attempt_index: u32 = 0;

        loop {
            let attempt = attempt_index as usize + 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable_error(&e) {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }

                    if attempt >= attempts {
                        warn!(
                            "{}: attempt {}/{} failed ({}), giving up",
                            operation_name, attempt, attempts, e
                        );
                        return Err(e);
                    }

                    let delay = policy.delay_for(attempt_index);
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                        operation_name,
                        attempt,
                        attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt_index += 1;
                }
            }
        }
    }
}
