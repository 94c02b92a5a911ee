/// Shared infrastructure concerns
///
/// Infrastructure used by more than one module: the Postgres pool and migrations.
pub mod database;

// Re-exports for convenience
pub use database::{Database, DbConnection, DbPool, MIGRATIONS};
