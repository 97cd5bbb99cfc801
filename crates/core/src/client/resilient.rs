//! Retrying HTTP client with fixed auth headers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, RETRY_AFTER};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::{ApiConfig, RetryConfig};
use crate::metrics;

use super::response::parse_retry_after;
use super::{ApiResponse, ApiTransport, ClientError, QueryParams};

/// HTTP client that applies auth headers and retries transient failures.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    client: Client,
    retry: RetryConfig,
}

impl ResilientClient {
    /// Create a new client for the given API and retry policy.
    pub fn new(api: &ApiConfig, retry: RetryConfig, token: &str) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("token {}", token))
            .map_err(|_| ClientError::InvalidHeader("Authorization"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let accept =
            HeaderValue::from_str(&api.accept).map_err(|_| ClientError::InvalidHeader("Accept"))?;
        headers.insert(ACCEPT, accept);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(api.user_agent.clone())
            .timeout(api.timeout())
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self { client, retry })
    }

    /// One attempt, body fully read.
    async fn send_once(&self, url: &str, params: QueryParams<'_>) -> Result<ApiResponse, ClientError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let link = headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_reqwest(url, e))?;

        Ok(ApiResponse {
            url: url.to_string(),
            status,
            link,
            retry_after,
            body,
        })
    }

    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(wait) => wait.min(self.retry.max_backoff()),
            None => self.retry.delay_for(attempt),
        }
    }
}

#[async_trait]
impl ApiTransport for ResilientClient {
    async fn get(&self, url: &str, params: QueryParams<'_>) -> Result<ApiResponse, ClientError> {
        let mut attempt: u32 = 0;

        loop {
            let started = Instant::now();
            let outcome = self.send_once(url, params).await;
            metrics::HTTP_ATTEMPT_DURATION.observe(started.elapsed().as_secs_f64());

            let can_retry = attempt < self.retry.max_retries;

            match outcome {
                Ok(response) if self.retry.should_retry_status(response.status) && can_retry => {
                    metrics::HTTP_ATTEMPTS
                        .with_label_values(&["retryable_status"])
                        .inc();
                    let delay = self.backoff(attempt, response.retry_after);
                    warn!(
                        url = url,
                        status = response.status,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable status, backing off"
                    );
                    metrics::HTTP_RETRIES.inc();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Ok(response) => {
                    let outcome = if response.is_success() {
                        "success"
                    } else {
                        "error_status"
                    };
                    metrics::HTTP_ATTEMPTS.with_label_values(&[outcome]).inc();
                    if attempt > 0 {
                        debug!(
                            url = url,
                            status = response.status,
                            attempts = attempt + 1,
                            "Request finished after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && can_retry => {
                    metrics::HTTP_ATTEMPTS
                        .with_label_values(&["transport_error"])
                        .inc();
                    let delay = self.backoff(attempt, None);
                    warn!(
                        url = url,
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient transport error, backing off"
                    );
                    metrics::HTTP_RETRIES.inc();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    metrics::HTTP_ATTEMPTS
                        .with_label_values(&["transport_error"])
                        .inc();
                    return Err(e);
                }
            }
        }
    }
}
