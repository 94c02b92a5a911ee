/// Translation queue processor
///
/// One `run_once` call claims a bounded batch, groups it by language pair, sends each
/// group to the translation provider and writes every job's outcome back. Provider and
/// job-level failures become job state transitions; only job-store failures escape.
use crate::modules::jobs::domain::{
    BackoffPolicy, ClaimRequest, FailureKind, JobOutcome, JobStore, ResourceScope, RetryDecision,
    RunStats, ScopeFilters, TextFormat, TranslationJob,
};
use crate::modules::provider::{ProviderError, TranslationProvider};
use crate::shared::config::QueueSettings;
use crate::shared::errors::AppResult;
use crate::shared::utils::logger::TimedOperation;
use crate::{log_debug, log_error, log_info, log_warn};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// `locked_by` column width
const WORKER_ID_MAX_LEN: usize = 64;

/// Jobs that can share one provider call.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub source_language: String,
    pub target_language: String,
    pub format: TextFormat,
    /// Only set when grouping by scope.
    pub scope: Option<ResourceScope>,
}

impl GroupKey {
    fn for_job(job: &TranslationJob, by_scope: bool) -> Self {
        Self {
            source_language: job.source_language.clone(),
            target_language: job.target_language.clone(),
            format: job.format,
            scope: by_scope.then(|| job.scope.clone()),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}>{}:{}",
            self.source_language, self.target_language, self.format
        )?;
        if let Some(scope) = &self.scope {
            write!(f, "@{}", scope)?;
        }
        Ok(())
    }
}

/// `cron:<host>:<pid>`, cut to fit the `locked_by` column.
pub fn default_worker_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string());

    let id = format!("cron:{}:{}", host, std::process::id());
    id.chars().take(WORKER_ID_MAX_LEN).collect()
}

pub struct TranslationQueueProcessor {
    store: Arc<dyn JobStore>,
    provider: Arc<dyn TranslationProvider>,
    worker_id: String,
    batch_size: usize,
    max_batch_size: usize,
    dry_run: bool,
    scope: ScopeFilters,
    group_by_scope: bool,
    backoff: BackoffPolicy,
    stale_after: chrono::Duration,
}

impl TranslationQueueProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        provider: Arc<dyn TranslationProvider>,
        settings: &QueueSettings,
        worker_id: impl Into<String>,
    ) -> Self {
        let worker_id: String = worker_id.into();
        let stale_after = chrono::Duration::from_std(settings.stale_lock_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(10));

        Self {
            store,
            provider,
            worker_id: worker_id.chars().take(WORKER_ID_MAX_LEN).collect(),
            batch_size: crate::shared::config::cli::DEFAULT_BATCH_SIZE
                .min(settings.max_batch_size),
            max_batch_size: settings.max_batch_size,
            dry_run: false,
            scope: ScopeFilters::default(),
            group_by_scope: settings.group_by_scope,
            backoff: BackoffPolicy::from_settings(settings),
            stale_after,
        }
    }

    /// Jobs claimed per call. Non-positive values are ignored and `false` is returned;
    /// larger values are clamped to the configured maximum.
    pub fn set_batch_size(&mut self, n: i64) -> bool {
        if n <= 0 {
            log_warn!(
                "tqp.config.batch_size.ignored value={} keep={}",
                n,
                self.batch_size
            );
            return false;
        }
        let requested = usize::try_from(n).unwrap_or(usize::MAX);
        self.batch_size = requested.min(self.max_batch_size);
        if self.batch_size < requested {
            log_warn!(
                "tqp.config.batch_size.clamped value={} max={}",
                requested,
                self.max_batch_size
            );
        }
        true
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn set_scope_filters(&mut self, scope: ScopeFilters) {
        self.scope = scope;
    }

    pub fn set_group_by_scope(&mut self, group_by_scope: bool) {
        self.group_by_scope = group_by_scope;
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn scope_filters(&self) -> &ScopeFilters {
        &self.scope
    }

    pub async fn run_once(&self) -> AppResult<RunStats> {
        self.run_once_at(Utc::now()).await
    }

    /// `run_once` against an explicit clock; claim, staleness and backoff all use `now`.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> AppResult<RunStats> {
        let timer = TimedOperation::new("tqp.run_once");
        log_debug!(
            "tqp.run.start worker={} batch={} dry_run={} scope={}",
            self.worker_id,
            self.batch_size,
            self.dry_run,
            self.scope
        );

        let mut stats = if self.dry_run {
            self.inspect(now).await?
        } else {
            self.process(now).await?
        };

        stats.elapsed_ms = timer.elapsed_ms();
        if stats.is_idle() {
            log_debug!("tqp.run.idle worker={}", self.worker_id);
        } else {
            log_info!(
                "tqp.run.done worker={} dry_run={} {}",
                self.worker_id,
                self.dry_run,
                stats
            );
        }
        Ok(stats)
    }

    /// Dry run: look at what would be claimed, group it, change nothing.
    async fn inspect(&self, now: DateTime<Utc>) -> AppResult<RunStats> {
        let jobs = self
            .store
            .peek_eligible(self.batch_size, &self.scope, self.stale_after, now)
            .await?;

        let groups = self.group(jobs);
        let mut stats = RunStats::default();
        for (key, jobs) in &groups {
            let ids: Vec<String> = jobs.iter().map(|j| j.id.to_string()).collect();
            log_info!(
                "tqp.dry_run.group key={} jobs={} ids={}",
                key,
                jobs.len(),
                ids.join(",")
            );
            stats.claimed += jobs.len();
        }
        stats.groups = groups.len();
        Ok(stats)
    }

    async fn process(&self, now: DateTime<Utc>) -> AppResult<RunStats> {
        let request = ClaimRequest {
            worker_id: self.worker_id.clone(),
            limit: self.batch_size,
            scope: self.scope.clone(),
            stale_after: self.stale_after,
            now,
        };
        let claimed = self.store.claim_batch(&request).await?;

        let mut stats = RunStats {
            claimed: claimed.len(),
            ..RunStats::default()
        };
        if claimed.is_empty() {
            return Ok(stats);
        }

        let (valid, invalid): (Vec<TranslationJob>, Vec<TranslationJob>) = claimed
            .into_iter()
            .partition(|job| job.validation_error().is_none());

        for job in invalid {
            let reason = job.validation_error().unwrap_or("invalid-queue-row");
            self.apply(&job, JobOutcome::fail(reason), "invalid", now, &mut stats)
                .await?;
        }

        for (key, jobs) in self.group(valid) {
            stats.groups += 1;
            stats.attempted += jobs.len();

            let outcomes = self.translate_group(&key, &jobs).await;
            let group = key.to_string();
            for (job, outcome) in jobs.iter().zip(outcomes) {
                self.apply(job, outcome, &group, now, &mut stats).await?;
            }
        }

        Ok(stats)
    }

    /// Claim order is kept inside every group; groups iterate in key order.
    fn group(&self, jobs: Vec<TranslationJob>) -> BTreeMap<GroupKey, Vec<TranslationJob>> {
        let mut groups: BTreeMap<GroupKey, Vec<TranslationJob>> = BTreeMap::new();
        for job in jobs {
            groups
                .entry(GroupKey::for_job(&job, self.group_by_scope))
                .or_default()
                .push(job);
        }
        groups
    }

    /// One provider call. Always returns exactly one outcome per job, in job order.
    async fn translate_group(&self, key: &GroupKey, jobs: &[TranslationJob]) -> Vec<JobOutcome> {
        let texts: Vec<String> = jobs.iter().map(|job| job.source_text.clone()).collect();
        let timer = TimedOperation::new("tqp.provider.translate");

        let result = self
            .provider
            .translate(
                &texts,
                &key.target_language,
                &key.source_language,
                key.format,
            )
            .await
            .and_then(|translations| {
                if translations.len() == texts.len() {
                    Ok(translations)
                } else {
                    Err(ProviderError::MalformedResponse(format!(
                        "expected {} translations, got {}",
                        texts.len(),
                        translations.len()
                    )))
                }
            });

        match result {
            Ok(translations) => {
                log_info!(
                    "tqp.group.done key={} provider={} jobs={} elapsed_ms={}",
                    key,
                    self.provider.name(),
                    jobs.len(),
                    timer.elapsed_ms()
                );
                translations
                    .into_iter()
                    .map(|text| {
                        if text.trim().is_empty() {
                            JobOutcome::retry("empty-translation")
                        } else {
                            JobOutcome::Translated(text)
                        }
                    })
                    .collect()
            }
            Err(error) => {
                let kind = error.failure_kind();
                let ids: Vec<String> = jobs.iter().map(|j| j.id.to_string()).collect();
                match kind {
                    FailureKind::Transient => log_warn!(
                        "tqp.group.failed key={} provider={} kind=transient jobs={} ids={} error=\"{}\"",
                        key,
                        self.provider.name(),
                        jobs.len(),
                        ids.join(","),
                        error
                    ),
                    FailureKind::Permanent => log_error!(
                        "tqp.group.failed key={} provider={} kind=permanent jobs={} ids={} error=\"{}\"",
                        key,
                        self.provider.name(),
                        jobs.len(),
                        ids.join(","),
                        error
                    ),
                }
                let reason = error.reason();
                jobs.iter()
                    .map(|_| JobOutcome::from_failure(kind, reason.clone()))
                    .collect()
            }
        }
    }

    /// Write one job's outcome. Store errors propagate; a lost claim is counted and logged.
    async fn apply(
        &self,
        job: &TranslationJob,
        outcome: JobOutcome,
        group: &str,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) -> AppResult<()> {
        let applied = match outcome {
            JobOutcome::Translated(text) => {
                let applied = self.store.mark_done(job.id, &self.worker_id, &text).await?;
                if applied {
                    stats.succeeded += 1;
                }
                applied
            }
            JobOutcome::Retry { reason } => match self.backoff.decide(job.attempts, now) {
                RetryDecision::RetryAt(run_after) => {
                    let applied = self
                        .store
                        .reschedule(job.id, &self.worker_id, run_after, &reason)
                        .await?;
                    if applied {
                        stats.retried += 1;
                        log_warn!(
                            "tqp.job.retry id={} key={} attempt={}/{} run_after={} reason=\"{}\"",
                            job.id,
                            group,
                            job.attempts,
                            self.backoff.max_attempts,
                            run_after.to_rfc3339(),
                            reason
                        );
                    }
                    applied
                }
                RetryDecision::GiveUp => {
                    let final_reason = format!("max-attempts ({})", reason);
                    let applied = self
                        .store
                        .mark_failed(job.id, &self.worker_id, &final_reason)
                        .await?;
                    if applied {
                        stats.failed += 1;
                        log_error!(
                            "tqp.job.failed id={} key={} attempt={} reason=\"{}\"",
                            job.id,
                            group,
                            job.attempts,
                            final_reason
                        );
                    }
                    applied
                }
            },
            JobOutcome::Fail { reason } => {
                let applied = self
                    .store
                    .mark_failed(job.id, &self.worker_id, &reason)
                    .await?;
                if applied {
                    stats.failed += 1;
                    log_error!(
                        "tqp.job.failed id={} key={} attempt={} reason=\"{}\"",
                        job.id,
                        group,
                        job.attempts,
                        reason
                    );
                }
                applied
            }
        };

        if !applied {
            stats.skipped += 1;
            log_warn!(
                "tqp.job.claim_lost id={} key={} worker={}",
                job.id,
                group,
                self.worker_id
            );
        }
        Ok(())
    }
}
