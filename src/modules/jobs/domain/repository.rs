/// Repository trait for translation queue persistence
///
/// Defines the interface for claiming and updating translation jobs.
/// `PgJobStore` implements it on PostgreSQL; `InMemoryJobStore` backs tests.
use crate::modules::jobs::domain::entities::{JobStatus, NewTranslationJob, TranslationJob};
use crate::modules::jobs::domain::scope::ScopeFilters;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Parameters for one atomic claim.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub worker_id: String,
    pub limit: usize,
    pub scope: ScopeFilters,
    /// Processing rows locked longer ago than this are reclaimed in the same statement.
    pub stale_after: Duration,
    pub now: DateTime<Utc>,
}

/// Filter for listing jobs (observability only).
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub scope: ScopeFilters,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Queue a job. Returns `None` when an identical job already exists.
    async fn enqueue(&self, job: NewTranslationJob) -> AppResult<Option<TranslationJob>>;

    /// Atomically move up to `limit` claimable jobs to `processing`, owned by `worker_id`,
    /// incrementing `attempts`. Two concurrent callers never receive the same row.
    ///
    /// Ordered `priority DESC, run_after ASC, id ASC`.
    async fn claim_batch(&self, request: &ClaimRequest) -> AppResult<Vec<TranslationJob>>;

    /// Same predicate and ordering as `claim_batch`, without mutating anything.
    async fn peek_eligible(
        &self,
        limit: usize,
        scope: &ScopeFilters,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<TranslationJob>>;

    /// Store the translation and finish the job.
    ///
    /// Like every write below, only applies while `worker_id` still owns the row;
    /// returns `false` when the claim was lost.
    async fn mark_done(&self, job_id: i64, worker_id: &str, translated_text: &str)
        -> AppResult<bool>;

    /// Put the job back in the queue, due at `run_after`.
    async fn reschedule(
        &self,
        job_id: i64,
        worker_id: &str,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> AppResult<bool>;

    /// Terminal failure with a recorded reason.
    async fn mark_failed(&self, job_id: i64, worker_id: &str, reason: &str) -> AppResult<bool>;

    /// Janitor sweep: stale `processing` rows go back to `queued`.
    async fn release_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> AppResult<usize>;

    /// Operator reset: every processing/failed/future-dated row goes back to `queued`
    /// with `attempts = 0` and `run_after = now`.
    async fn reset_queue(&self, now: DateTime<Utc>) -> AppResult<usize>;

    /// Get job by ID
    async fn get_by_id(&self, job_id: i64) -> AppResult<Option<TranslationJob>>;

    async fn list_jobs(&self, query: &JobQuery) -> AppResult<Vec<TranslationJob>>;

    /// Get queue statistics, optionally restricted to a scope
    async fn count_by_status(&self, scope: &ScopeFilters) -> AppResult<QueueStatistics>;
}

/// Translation queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStatistics {
    pub queued_count: i64,
    pub processing_count: i64,
    pub done_count: i64,
    pub failed_count: i64,
    pub total_count: i64,
}

impl QueueStatistics {
    pub fn record(&mut self, status: JobStatus, count: i64) {
        match status {
            JobStatus::Queued => self.queued_count += count,
            JobStatus::Processing => self.processing_count += count,
            JobStatus::Done => self.done_count += count,
            JobStatus::Failed => self.failed_count += count,
        }
        self.total_count += count;
    }
}

impl std::fmt::Display for QueueStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "queued={} processing={} done={} failed={} total={}",
            self.queued_count,
            self.processing_count,
            self.done_count,
            self.failed_count,
            self.total_count
        )
    }
}
