// Cron entry point: `translation-cron [--max-secs=N] [--batch-size=N] [--dry-run] [--fake] ...`

use anyhow::Context;
use translation_queue_lib::modules::jobs::DriverOutcome;
use translation_queue_lib::shared::config::{CliOptions, USAGE};
use translation_queue_lib::shared::utils::{init_logger, LoggerSettings};
use translation_queue_lib::shared::AppConfig;

fn main() {
    if let Err(e) = real_main() {
        log::error!("tqp.fatal error=\"{:#}\"", e);
        eprintln!("translation-cron: {:#}", e);
        std::process::exit(1);
    }
}

fn real_main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    init_logger(&LoggerSettings {
        log_file: config.paths.log_file.clone(),
        timezone: config.log_timezone,
    });

    let cli = CliOptions::from_args().context("parsing arguments")?;
    if cli.show_help {
        print!("{}", USAGE);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;

    match runtime.block_on(translation_queue_lib::run(&config, &cli))? {
        DriverOutcome::Skipped => log::info!("tqp.exit skipped=true"),
        DriverOutcome::Completed { iterations, stats } => {
            log::info!("tqp.exit iterations={} {}", iterations, stats)
        }
    }
    Ok(())
}
