/// Translation providers
///
/// - Domain: provider selection (a closed set of backends, chosen once at startup)
/// - Infrastructure: Google Translate v2 over a rate-limited HTTP client, and the null
///   echo translator
/// - Traits: the `TranslationProvider` seam and its `ProviderError` classification
pub mod domain;
pub mod infrastructure;
pub mod traits;

// Re-exports for easy external access
pub use domain::{build_provider, select_provider_kind, ProviderKind};
pub use infrastructure::{GoogleTranslateProvider, NullTranslationProvider};
pub use traits::{ProviderError, TranslationProvider};
