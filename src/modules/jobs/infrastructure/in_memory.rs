/// In-process JobStore with the same claim semantics as the Postgres store.
///
/// Every operation runs under one mutex, which makes each claim atomic. Used by tests
/// and by dry runs without a database.
use crate::modules::jobs::domain::entities::{JobStatus, NewTranslationJob, TranslationJob};
use crate::modules::jobs::domain::repository::{ClaimRequest, JobQuery, JobStore, QueueStatistics};
use crate::modules::jobs::domain::scope::ScopeFilters;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<i64, TranslationJob>,
    next_id: i64,
    writes: usize,
}

impl State {
    /// Claimable rows in claim order.
    fn eligible_ids(
        &self,
        limit: usize,
        scope: &ScopeFilters,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Vec<i64> {
        let mut eligible: Vec<&TranslationJob> = self
            .rows
            .values()
            .filter(|job| job.is_claimable(now, stale_after) && scope.matches(job))
            .collect();
        eligible.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.run_after.cmp(&b.run_after))
                .then(a.id.cmp(&b.id))
        });
        eligible.into_iter().take(limit).map(|job| job.id).collect()
    }

    fn owned_mut(&mut self, job_id: i64, worker_id: &str) -> Option<&mut TranslationJob> {
        self.rows
            .get_mut(&job_id)
            .filter(|job| job.is_owned_by(worker_id))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    state: Mutex<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| AppError::InternalError(format!("Job store mutex poisoned: {}", e)))
    }

    /// Seed a row as-is (any status). A zero id is replaced with the next free id.
    pub fn insert(&self, mut job: TranslationJob) -> AppResult<i64> {
        let mut state = self.lock()?;
        if job.id == 0 {
            state.next_id += 1;
            job.id = state.next_id;
        } else {
            state.next_id = state.next_id.max(job.id);
        }
        let id = job.id;
        state.rows.insert(id, job);
        Ok(id)
    }

    /// All rows ordered by id.
    pub fn snapshot(&self) -> AppResult<Vec<TranslationJob>> {
        Ok(self.lock()?.rows.values().cloned().collect())
    }

    /// Number of mutating operations that changed at least one row.
    pub fn writes(&self) -> AppResult<usize> {
        Ok(self.lock()?.writes)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: NewTranslationJob) -> AppResult<Option<TranslationJob>> {
        if job.source_text.trim().is_empty() || job.target_language.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Translation job needs source text and a target language".to_string(),
            ));
        }
        if job.is_same_language() {
            return Err(AppError::InvalidInput(format!(
                "Target language '{}' equals source language",
                job.target_language
            )));
        }

        let mut state = self.lock()?;
        let source_language = job.source_language.to_lowercase();
        let target_language = job.target_language.to_lowercase();
        let duplicate = state.rows.values().any(|existing| {
            existing.source_language == source_language
                && existing.target_language == target_language
                && existing.scope == job.scope
                && existing.source_text == job.source_text
        });
        if duplicate {
            return Ok(None);
        }

        let now = Utc::now();
        state.next_id += 1;
        let record = TranslationJob {
            id: state.next_id,
            source_text: job.source_text,
            source_language,
            target_language,
            format: job.format,
            scope: job.scope,
            string_key: job.string_key,
            status: JobStatus::Queued,
            locked_by: None,
            locked_at: None,
            attempts: 0,
            run_after: job.run_after.unwrap_or(now),
            priority: job.priority,
            translated_text: None,
            last_error: None,
            queued_at: now,
            completed_at: None,
        };
        state.rows.insert(record.id, record.clone());
        state.writes += 1;
        Ok(Some(record))
    }

    async fn claim_batch(&self, request: &ClaimRequest) -> AppResult<Vec<TranslationJob>> {
        let mut state = self.lock()?;
        let ids = state.eligible_ids(
            request.limit,
            &request.scope,
            request.stale_after,
            request.now,
        );

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = state.rows.get_mut(&id) {
                job.status = JobStatus::Processing;
                job.locked_by = Some(request.worker_id.clone());
                job.locked_at = Some(request.now);
                job.attempts += 1;
                claimed.push(job.clone());
            }
        }
        if !claimed.is_empty() {
            state.writes += 1;
        }
        Ok(claimed)
    }

    async fn peek_eligible(
        &self,
        limit: usize,
        scope: &ScopeFilters,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<TranslationJob>> {
        let state = self.lock()?;
        Ok(state
            .eligible_ids(limit, scope, stale_after, now)
            .into_iter()
            .filter_map(|id| state.rows.get(&id).cloned())
            .collect())
    }

    async fn mark_done(
        &self,
        job_id: i64,
        worker_id: &str,
        translated_text: &str,
    ) -> AppResult<bool> {
        let mut state = self.lock()?;
        let Some(job) = state.owned_mut(job_id, worker_id) else {
            return Ok(false);
        };
        job.status = JobStatus::Done;
        job.translated_text = Some(translated_text.to_string());
        job.locked_by = None;
        job.locked_at = None;
        job.last_error = None;
        job.completed_at = Some(Utc::now());
        state.writes += 1;
        Ok(true)
    }

    async fn reschedule(
        &self,
        job_id: i64,
        worker_id: &str,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> AppResult<bool> {
        let mut state = self.lock()?;
        let Some(job) = state.owned_mut(job_id, worker_id) else {
            return Ok(false);
        };
        job.status = JobStatus::Queued;
        job.run_after = run_after;
        job.last_error = Some(error.to_string());
        job.locked_by = None;
        job.locked_at = None;
        state.writes += 1;
        Ok(true)
    }

    async fn mark_failed(&self, job_id: i64, worker_id: &str, reason: &str) -> AppResult<bool> {
        let mut state = self.lock()?;
        let Some(job) = state.owned_mut(job_id, worker_id) else {
            return Ok(false);
        };
        job.status = JobStatus::Failed;
        job.last_error = Some(reason.to_string());
        job.locked_by = None;
        job.locked_at = None;
        job.completed_at = Some(Utc::now());
        state.writes += 1;
        Ok(true)
    }

    async fn release_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> AppResult<usize> {
        let mut state = self.lock()?;
        let mut released = 0;
        for job in state.rows.values_mut() {
            if job.is_stale(now, stale_after) {
                job.status = JobStatus::Queued;
                job.locked_by = None;
                job.locked_at = None;
                job.run_after = now;
                released += 1;
            }
        }
        if released > 0 {
            state.writes += 1;
        }
        Ok(released)
    }

    async fn reset_queue(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut state = self.lock()?;
        let mut reset = 0;
        for job in state.rows.values_mut() {
            let applies = matches!(job.status, JobStatus::Processing | JobStatus::Failed)
                || (job.status == JobStatus::Queued && job.run_after > now);
            if applies {
                job.status = JobStatus::Queued;
                job.locked_by = None;
                job.locked_at = None;
                job.attempts = 0;
                job.run_after = now;
                job.completed_at = None;
                reset += 1;
            }
        }
        if reset > 0 {
            state.writes += 1;
        }
        Ok(reset)
    }

    async fn get_by_id(&self, job_id: i64) -> AppResult<Option<TranslationJob>> {
        Ok(self.lock()?.rows.get(&job_id).cloned())
    }

    async fn list_jobs(&self, query: &JobQuery) -> AppResult<Vec<TranslationJob>> {
        let state = self.lock()?;
        let mut jobs: Vec<TranslationJob> = state
            .rows
            .values()
            .filter(|job| query.status.map_or(true, |s| job.status == s))
            .filter(|job| query.scope.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.run_after.cmp(&b.run_after))
                .then(a.id.cmp(&b.id))
        });
        if let Some(limit) = query.limit {
            jobs.truncate(limit);
        }
        Ok(jobs)
    }

    async fn count_by_status(&self, scope: &ScopeFilters) -> AppResult<QueueStatistics> {
        let state = self.lock()?;
        let mut stats = QueueStatistics::default();
        for job in state.rows.values().filter(|job| scope.matches(job)) {
            stats.record(job.status, 1);
        }
        Ok(stats)
    }
}
