pub mod external;
pub mod http_client;
pub mod null_provider;

// Re-export commonly used types
pub use external::GoogleTranslateProvider;
pub use http_client::{RateLimitClient, RetryPolicy};
pub use null_provider::NullTranslationProvider;
