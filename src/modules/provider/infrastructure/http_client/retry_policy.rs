//! Retry policies for translation backends
//!
//! Handles rate limiting with retry logic based on HTTP headers and a jittered
//! exponential backoff.

use rand::Rng;
use std::time::Duration;

/// Configuration for HTTP retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries (will be adjusted based on headers)
    pub base_delay: Duration,
    /// Maximum delay to wait (prevents excessive waits)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Random extra delay added to every computed wait
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Google Translate v2: three attempts, waits of 0.5s and 1s plus up to 200ms jitter
    pub fn google() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: Duration::from_millis(200),
        }
    }

    /// No retries at all (tests against local fake servers)
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt + 1`, without jitter.
    pub fn base_delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        // If server provided Retry-After header, respect it
        if let Some(server_delay) = retry_after {
            return server_delay.min(self.max_delay);
        }

        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((self.base_delay.as_millis() as f64 * multiplier) as u64)
            .min(self.max_delay)
    }

    /// Calculate delay for next retry attempt
    pub fn calculate_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.base_delay_for(attempt, retry_after);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Information extracted from HTTP 429 responses
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// How long to wait before next request (from Retry-After header)
    pub retry_after: Option<Duration>,
    /// When the rate limit resets (from X-RateLimit-Reset header)
    pub reset_time: Option<Duration>,
}

impl RateLimitInfo {
    /// Parse rate limit information from HTTP response headers
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let retry_after = headers
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let reset_time = headers
            .get("x-ratelimit-reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|timestamp| {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                Duration::from_secs(timestamp.saturating_sub(now))
            });

        Self {
            retry_after,
            reset_time,
        }
    }

    /// Get the best delay recommendation from available information
    pub fn recommended_delay(&self) -> Option<Duration> {
        self.retry_after.or(self.reset_time)
    }
}

/// Statuses worth another attempt inside the same provider call
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_policy() {
        let policy = RetryPolicy::google();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay_for(0, None), Duration::from_millis(500));
        assert_eq!(policy.base_delay_for(1, None), Duration::from_secs(1));
    }

    #[test]
    fn test_calculate_delay_with_retry_after() {
        let policy = RetryPolicy::google();
        let delay = policy.base_delay_for(1, Some(Duration::from_secs(3)));
        assert_eq!(delay, Duration::from_secs(3));

        let capped = policy.base_delay_for(1, Some(Duration::from_secs(300)));
        assert_eq!(capped, policy.max_delay);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::google();
        for _ in 0..20 {
            let delay = policy.calculate_delay(0, None);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(700));
        }
    }

    #[test]
    fn test_rate_limit_info_parsing() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("retry-after", "30".parse().unwrap());

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.retry_after, Some(Duration::from_secs(30)));
        assert_eq!(info.recommended_delay(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(408));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(403));
    }
}
