pub mod provider_factory;

pub use provider_factory::{build_provider, select_provider_kind, ProviderKind};
