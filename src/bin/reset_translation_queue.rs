// Operator tool: put processing, failed and future-dated queued jobs back in line.
//
// `--stale-only` just releases claims older than TQ_STALE_LOCK_SECS.

use anyhow::Context;
use chrono::Utc;
use translation_queue_lib::modules::jobs::{JobStore, PgJobStore, ScopeFilters};
use translation_queue_lib::shared::utils::{init_logger, LoggerSettings};
use translation_queue_lib::shared::{AppConfig, Database};

fn main() {
    if let Err(e) = real_main() {
        log::error!("tqp.reset.failed error=\"{:#}\"", e);
        eprintln!("reset-translation-queue: {:#}", e);
        std::process::exit(1);
    }
}

fn real_main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    init_logger(&LoggerSettings {
        log_file: config.paths.log_file.clone(),
        timezone: config.log_timezone,
    });

    let mut stale_only = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--stale-only" => stale_only = true,
            "-h" | "--help" => {
                println!("Usage: reset-translation-queue [--stale-only]");
                return Ok(());
            }
            other => anyhow::bail!("unknown argument {}", other),
        }
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;

    runtime.block_on(async {
        let database = Database::connect(config.require_database_url()?)?;
        database.run_migrations()?;
        let store = PgJobStore::new(database.pool().clone());
        let everything = ScopeFilters::default();

        let before = store.count_by_status(&everything).await?;
        log::info!("tqp.reset.before {}", before);

        let now = Utc::now();
        let rows = if stale_only {
            let stale_after = chrono::Duration::from_std(config.queue.stale_lock_after)
                .context("stale lock window out of range")?;
            store.release_stale(stale_after, now).await?
        } else {
            store.reset_queue(now).await?
        };

        let after = store.count_by_status(&everything).await?;
        log::info!("tqp.reset.done rows={} stale_only={} {}", rows, stale_only, after);
        println!("Requeued {} translation job(s).", rows);
        anyhow::Ok(())
    })
}
