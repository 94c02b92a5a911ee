/// Cron loop: take the process lock, run the setup step, call `run_once` until the time
/// budget is spent, release the lock on every path.
use crate::modules::jobs::domain::RunStats;
use crate::modules::jobs::heartbeat::Heartbeat;
use crate::modules::jobs::lock::ProcessLock;
use crate::modules::jobs::processor::TranslationQueueProcessor;
use crate::shared::errors::AppResult;
use crate::{log_error, log_info, log_warn};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use uuid::Uuid;

/// Pause after an iteration that found nothing to claim
pub const IDLE_SLEEP: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOutcome {
    /// Another instance holds the lock; nothing was touched.
    Skipped,
    Completed { iterations: usize, stats: RunStats },
}

/// One-off work that must only happen while the lock is held (schema migrations).
pub type SetupStep = Box<dyn FnOnce() -> AppResult<()> + Send>;

pub struct CronDriver {
    processor: TranslationQueueProcessor,
    lock: Box<dyn ProcessLock>,
    setup: Option<SetupStep>,
    heartbeat: Option<Heartbeat>,
    idle_sleep: Duration,
    run_id: Uuid,
}

impl CronDriver {
    pub fn new(processor: TranslationQueueProcessor, lock: Box<dyn ProcessLock>) -> Self {
        Self {
            processor,
            lock,
            setup: None,
            heartbeat: None,
            idle_sleep: IDLE_SLEEP,
            run_id: Uuid::new_v4(),
        }
    }

    /// Runs once after the lock is acquired and before the first `run_once`.
    /// A failure releases the lock and ends the run with that error.
    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn run(&mut self, max_secs: u64) -> AppResult<DriverOutcome> {
        log_info!(
            "tqp.driver.start run_id={} worker={} lock={} max_secs={} batch={} dry_run={}",
            self.run_id,
            self.processor.worker_id(),
            self.lock.describe(),
            max_secs,
            self.processor.batch_size(),
            self.processor.is_dry_run()
        );

        // Every invocation beats, skipped ones included.
        self.beat();

        if !self.lock.try_acquire().await? {
            log_info!(
                "tqp.driver.skipped run_id={} reason=\"lock held\" lock={}",
                self.run_id,
                self.lock.describe()
            );
            return Ok(DriverOutcome::Skipped);
        }

        let deadline = Instant::now() + Duration::from_secs(max_secs);
        let result = match self.setup.take().map_or(Ok(()), |setup| setup()) {
            Ok(()) => self.run_locked(deadline).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.lock.release().await {
            log_warn!("tqp.driver.unlock_failed run_id={} error=\"{}\"", self.run_id, e);
        }

        match &result {
            Ok(DriverOutcome::Completed { iterations, stats }) => log_info!(
                "tqp.driver.done run_id={} iterations={} {}",
                self.run_id,
                iterations,
                stats
            ),
            Ok(DriverOutcome::Skipped) => {}
            Err(e) => log_error!("tqp.driver.failed run_id={} error=\"{}\"", self.run_id, e),
        }
        result
    }

    async fn run_locked(&self, deadline: Instant) -> AppResult<DriverOutcome> {
        let mut iterations = 0;
        let mut total = RunStats::default();

        while Instant::now() < deadline {
            let stats = self.processor.run_once().await?;
            iterations += 1;
            total.absorb(&stats);
            self.beat();

            // A dry run would only inspect the same rows again.
            if self.processor.is_dry_run() {
                break;
            }

            if stats.is_idle() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining <= self.idle_sleep {
                    break;
                }
                sleep(self.idle_sleep).await;
            }
        }

        Ok(DriverOutcome::Completed {
            iterations,
            stats: total,
        })
    }

    fn beat(&self) {
        if let Some(heartbeat) = &self.heartbeat {
            if let Err(e) = heartbeat.touch() {
                log_warn!(
                    "tqp.heartbeat.failed file={} error=\"{}\"",
                    heartbeat.path().display(),
                    e
                );
            }
        }
    }
}
