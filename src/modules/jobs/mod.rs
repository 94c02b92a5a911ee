/// Translation queue
///
/// Architecture:
/// - Domain: job entities, scope filters, backoff and the `JobStore` trait
/// - Infrastructure: Diesel/PostgreSQL store and an in-memory store
/// - Processor: claims a batch, groups it, calls the provider, writes outcomes
/// - Driver: cron loop under a process lock
pub mod domain;
pub mod driver;
pub mod heartbeat;
pub mod infrastructure;
pub mod lock;
pub mod processor;

pub use domain::{
    BackoffPolicy, JobOutcome, JobQuery, JobStatus, JobStore, NewTranslationJob, QueueStatistics,
    ResourceScope, RunStats, ScopeFilters, TextFormat, TranslationJob,
};
pub use driver::{CronDriver, DriverOutcome};
pub use heartbeat::Heartbeat;
pub use infrastructure::{InMemoryJobStore, PgJobStore};
pub use lock::{AdvisoryProcessLock, FileProcessLock, ProcessLock};
pub use processor::{default_worker_id, GroupKey, TranslationQueueProcessor};
