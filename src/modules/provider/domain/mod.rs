pub mod services;

// Re-exports for easy access
pub use services::{build_provider, select_provider_kind, ProviderKind};
