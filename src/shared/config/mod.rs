pub mod app_config;
pub mod cli;

pub use app_config::{
    parse_bool, AppConfig, LockBackend, MAX_BACKOFF, PathSettings, ProviderSettings, QueueSettings,
};
pub use cli::{CliOptions, ScopeArgs, USAGE};
