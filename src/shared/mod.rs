// Shared kernel used by every module: configuration, errors, infrastructure, logging.

pub mod config; // Startup configuration and CLI options
pub mod errors; // Shared error types
pub mod infrastructure; // Database pool and migrations
pub mod utils; // Logging helpers

// Re-exports for convenience
pub use config::AppConfig;
pub use errors::{AppError, AppResult};
pub use infrastructure::Database;
