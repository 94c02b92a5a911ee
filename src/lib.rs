pub mod modules;
pub mod schema;
pub mod shared;

use modules::jobs::{
    default_worker_id, AdvisoryProcessLock, CronDriver, DriverOutcome, FileProcessLock, Heartbeat,
    JobStore, PgJobStore, ProcessLock, ScopeFilters, TranslationQueueProcessor,
};
use modules::provider::build_provider;
use shared::config::{CliOptions, LockBackend};
use shared::{AppConfig, AppResult, Database};
use std::sync::Arc;

/// Advisory lock name shared by every cron instance on one database
pub const CRON_LOCK_NAME: &str = "translation-cron";

/// Processor wired from config and command-line options.
pub fn build_processor(
    config: &AppConfig,
    cli: &CliOptions,
    store: Arc<dyn JobStore>,
) -> AppResult<TranslationQueueProcessor> {
    let provider = build_provider(config, cli.fake)?;

    let mut processor =
        TranslationQueueProcessor::new(store, provider, &config.queue, default_worker_id());
    processor.set_batch_size(i64::try_from(cli.batch_size).unwrap_or(i64::MAX));
    processor.set_dry_run(cli.dry_run);
    processor.set_scope_filters(ScopeFilters::from(&cli.scope));
    Ok(processor)
}

pub fn build_lock(config: &AppConfig, database: &Database) -> Box<dyn ProcessLock> {
    match config.queue.lock_backend {
        LockBackend::File => Box::new(FileProcessLock::new(&config.paths.lock_file)),
        LockBackend::Advisory => Box::new(AdvisoryProcessLock::new(
            database.clone(),
            CRON_LOCK_NAME,
        )),
    }
}

/// One cron invocation: connect, take the lock, migrate, then drive the processor for
/// `cli.max_secs`. Migrations run only while the lock is held.
pub async fn run(config: &AppConfig, cli: &CliOptions) -> AppResult<DriverOutcome> {
    let database = Database::connect(config.require_database_url()?)?;

    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(database.pool().clone()));
    let processor = build_processor(config, cli, store)?;
    let lock = build_lock(config, &database);

    let mut driver = CronDriver::new(processor, lock)
        .with_setup(move || database.run_migrations().map(|_| ()))
        .with_heartbeat(Heartbeat::new(&config.paths.heartbeat_file));
    driver.run(cli.max_secs).await
}
