pub mod rate_limit_client;
pub mod retry_policy;

pub use rate_limit_client::{ErrorMessageParser, RateLimitClient};
pub use retry_policy::{is_retryable_status, RateLimitInfo, RetryPolicy};
