//! HTTP client with automatic rate limiting and retry logic
//!
//! Retries transport failures, 429 and 5xx responses inside one provider call and
//! classifies whatever is left into a `ProviderError` for the queue to act on.

use super::retry_policy::{is_retryable_status, RateLimitInfo, RetryPolicy};
use crate::modules::provider::traits::ProviderError;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_warn};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::sleep;

type DirectRateLimiter = GovernorRateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
    governor::middleware::NoOpMiddleware,
>;

/// Pulls a human-readable message out of an error body.
pub type ErrorMessageParser = fn(&str) -> Option<String>;

/// HTTP client that handles rate limiting and retries
pub struct RateLimitClient {
    client: Client,
    rate_limiter: DirectRateLimiter,
    retry_policy: RetryPolicy,
    provider_name: String,
    error_parser: ErrorMessageParser,
}

impl RateLimitClient {
    /// Create a new client for the Google Translate v2 API
    pub fn for_google(error_parser: ErrorMessageParser) -> AppResult<Self> {
        Self::new(
            "Google",
            RetryPolicy::google(),
            // v2 allows far more; this keeps one cron run from bursting
            Self::create_rate_limiter(5, 5),
            Duration::from_secs(5),
            Duration::from_secs(20),
            error_parser,
        )
    }

    /// Create a rate limiter with specified requests per second and burst capacity
    fn create_rate_limiter(requests_per_second: u32, burst_size: u32) -> DirectRateLimiter {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN);
        GovernorRateLimiter::direct(Quota::per_second(rate).allow_burst(burst))
    }

    /// Create a custom client
    pub fn new(
        provider_name: &str,
        retry_policy: RetryPolicy,
        rate_limiter: DirectRateLimiter,
        connect_timeout: Duration,
        timeout: Duration,
        error_parser: ErrorMessageParser,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(concat!("translation-queue/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter,
            retry_policy,
            provider_name: provider_name.to_string(),
            error_parser,
        })
    }

    /// Replace the retry policy (tests use `RetryPolicy::none()`)
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// POST a JSON body and decode a JSON response, retrying what is retryable
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let attempts = self.retry_policy.max_retries + 1;

        for attempt in 0..attempts {
            // Wait for rate limiter before attempting request
            self.rate_limiter.until_ready().await;
            let is_last = attempt + 1 == attempts;

            let response = match self.client.post(url).json(body).send().await {
                Ok(response) => response,
                Err(e) => {
                    let error = ProviderError::Transport(e.without_url().to_string());
                    if is_last {
                        return Err(error);
                    }
                    let delay = self.retry_policy.calculate_delay(attempt, None);
                    log_warn!(
                        "provider.http.retry provider={} attempt={}/{} error=\"{}\" wait_ms={}",
                        self.provider_name,
                        attempt + 1,
                        attempts,
                        error,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return self.parse_response(response).await;
            }

            let rate_limit_info = RateLimitInfo::from_headers(response.headers());
            let error = self.error_from_response(status, response).await;

            if is_retryable_status(status.as_u16()) && !is_last {
                let delay = self
                    .retry_policy
                    .calculate_delay(attempt, rate_limit_info.recommended_delay());
                log_warn!(
                    "provider.http.retry provider={} attempt={}/{} status={} wait_ms={}",
                    self.provider_name,
                    attempt + 1,
                    attempts,
                    status.as_u16(),
                    delay.as_millis()
                );
                sleep(delay).await;
                continue;
            }

            return Err(error);
        }

        Err(ProviderError::Transport(format!(
            "{} request not attempted",
            self.provider_name
        )))
    }

    async fn error_from_response(&self, status: StatusCode, response: Response) -> ProviderError {
        let body = response.text().await.unwrap_or_default();
        let message = (self.error_parser)(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
        ProviderError::from_status(status.as_u16(), message)
    }

    /// Decode a successful response; bodies are only logged by size
    async fn parse_response<T>(&self, response: Response) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let response_text = response.text().await.map_err(|e| {
            ProviderError::Transport(format!(
                "Failed to read {} response: {}",
                self.provider_name, e
            ))
        })?;
        log_debug!(
            "provider.http.ok provider={} bytes={}",
            self.provider_name,
            response_text.len()
        );

        serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::MalformedResponse(format!(
                "Failed to parse {} response: {}",
                self.provider_name, e
            ))
        })
    }

    /// Check if a request can be made now (for testing/debugging)
    pub fn can_make_request_now(&self) -> bool {
        self.rate_limiter.check().is_ok()
    }

    /// Get provider name
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }
}
