/// Diesel-based implementation of JobStore
///
/// Uses PostgreSQL with SELECT FOR UPDATE SKIP LOCKED for atomic batch claiming.
use crate::modules::jobs::domain::entities::{JobStatus, NewTranslationJob, TranslationJob};
use crate::modules::jobs::domain::repository::{ClaimRequest, JobQuery, JobStore, QueueStatistics};
use crate::modules::jobs::domain::scope::ScopeFilters;
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::modules::jobs::infrastructure::models::{NewJobRow, TranslationJobRow};
use crate::schema::translation_queue;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::{DbConnection, DbPool};
use crate::shared::utils::logger::LogContext;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Nullable, Text, Timestamptz};

/// Scope binds always take `$1..$5`.
const SCOPE_PREDICATE: &str = "($1::text IS NULL OR target_language = $1)
      AND ($2::text IS NULL OR client_code = $2)
      AND ($3::text IS NULL OR resource_type = $3)
      AND ($4::text IS NULL OR subject = $4)
      AND ($5::text IS NULL OR variant = $5)";

/// Claimable: due queued rows, or processing rows locked before the stale cutoff.
const CLAIMABLE_PREDICATE: &str = "((status = 'queued' AND run_after <= $6)
        OR (status = 'processing' AND (locked_at IS NULL OR locked_at <= $7)))";

const CLAIM_ORDER: &str = "priority DESC, run_after ASC, id ASC";

/// Helper struct for GROUP BY status counts
#[derive(QueryableByName)]
struct StatusCount {
    #[diesel(sql_type = crate::schema::sql_types::TranslationJobStatus)]
    status: JobStatusDb,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

fn bind_scope<'f>(
    query: BoxedSqlQuery<'f, Pg, SqlQuery>,
    scope: &ScopeFilters,
) -> BoxedSqlQuery<'f, Pg, SqlQuery> {
    query
        .bind::<Nullable<Text>, _>(scope.target_language.clone())
        .bind::<Nullable<Text>, _>(scope.client_code.clone())
        .bind::<Nullable<Text>, _>(scope.resource_type.clone())
        .bind::<Nullable<Text>, _>(scope.subject.clone())
        .bind::<Nullable<Text>, _>(scope.variant.clone())
}

/// `RETURNING` order is unspecified, so claimed rows are re-sorted into claim order.
fn sort_claim_order(jobs: &mut [TranslationJob]) {
    jobs.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.run_after.cmp(&b.run_after))
            .then(a.id.cmp(&b.id))
    });
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Target of the ownership-guarded writes: the row must still be processing under `worker_id`.
macro_rules! owned_row {
    ($job_id:expr, $worker_id:expr) => {
        translation_queue::table
            .filter(translation_queue::id.eq($job_id))
            .filter(translation_queue::status.eq(JobStatusDb::Processing))
            .filter(translation_queue::locked_by.eq($worker_id))
    };
}

pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get database connection from pool
    fn get_conn(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get connection: {}", e)))
    }
}

#[async_trait]
impl JobStore for PgJobStore {
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

        let row = NewJobRow::from_domain(job, Utc::now());
        let mut conn = self.get_conn()?;

        // Duplicates hit uq_translation_queue_job and insert nothing.
        let inserted: Option<TranslationJobRow> = diesel::insert_into(translation_queue::table)
            .values(&row)
            .on_conflict_do_nothing()
            .returning(TranslationJobRow::as_returning())
            .get_result(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to enqueue job: {}", e)))?;

        Ok(inserted.map(TranslationJobRow::into_domain))
    }

    async fn claim_batch(&self, request: &ClaimRequest) -> AppResult<Vec<TranslationJob>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.get_conn()?;
        let start = std::time::Instant::now();

        // One statement: the CTE locks candidate rows (skipping rows another claimer holds)
        // and the UPDATE takes ownership, so no row can be claimed twice.
        let sql = format!(
            r#"
            WITH picked AS (
                SELECT id
                FROM translation_queue
                WHERE {claimable}
                  AND {scope}
                ORDER BY {order}
                LIMIT $8
                FOR UPDATE SKIP LOCKED
            )
            UPDATE translation_queue AS q
            SET status = 'processing',
                locked_by = $9,
                locked_at = $6,
                attempts = q.attempts + 1
            FROM picked
            WHERE q.id = picked.id
            RETURNING q.*
            "#,
            claimable = CLAIMABLE_PREDICATE,
            scope = SCOPE_PREDICATE,
            order = CLAIM_ORDER,
        );

        let rows: Vec<TranslationJobRow> =
            bind_scope(diesel::sql_query(sql).into_boxed(), &request.scope)
                .bind::<Timestamptz, _>(request.now)
                .bind::<Timestamptz, _>(request.now - request.stale_after)
                .bind::<BigInt, _>(limit_param(request.limit))
                .bind::<Text, _>(request.worker_id.clone())
                .load(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to claim jobs: {}", e)))?;

        LogContext::db_operation(
            "claim_batch",
            "translation_queue",
            Some(start.elapsed().as_millis() as u64),
        );

        let mut jobs: Vec<TranslationJob> =
            rows.into_iter().map(TranslationJobRow::into_domain).collect();
        sort_claim_order(&mut jobs);
        Ok(jobs)
    }

    async fn peek_eligible(
        &self,
        limit: usize,
        scope: &ScopeFilters,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<TranslationJob>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.get_conn()?;

        let sql = format!(
            "SELECT * FROM translation_queue
             WHERE {claimable}
               AND {scope}
             ORDER BY {order}
             LIMIT $8",
            claimable = CLAIMABLE_PREDICATE,
            scope = SCOPE_PREDICATE,
            order = CLAIM_ORDER,
        );

        let rows: Vec<TranslationJobRow> = bind_scope(diesel::sql_query(sql).into_boxed(), scope)
            .bind::<Timestamptz, _>(now)
            .bind::<Timestamptz, _>(now - stale_after)
            .bind::<BigInt, _>(limit_param(limit))
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to peek jobs: {}", e)))?;

        Ok(rows.into_iter().map(TranslationJobRow::into_domain).collect())
    }

    async fn mark_done(
        &self,
        job_id: i64,
        worker_id: &str,
        translated_text: &str,
    ) -> AppResult<bool> {
        let mut conn = self.get_conn()?;

        let updated = diesel::update(owned_row!(job_id, worker_id))
            .set((
                translation_queue::status.eq(JobStatusDb::Done),
                translation_queue::translated_text.eq(Some(translated_text)),
                translation_queue::locked_by.eq(None::<String>),
                translation_queue::locked_at.eq(None::<DateTime<Utc>>),
                translation_queue::last_error.eq(None::<String>),
                translation_queue::completed_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark job as done: {}", e)))?;

        Ok(updated == 1)
    }

    async fn reschedule(
        &self,
        job_id: i64,
        worker_id: &str,
        run_after: DateTime<Utc>,
        error: &str,
    ) -> AppResult<bool> {
        let mut conn = self.get_conn()?;

        let updated = diesel::update(owned_row!(job_id, worker_id))
            .set((
                translation_queue::status.eq(JobStatusDb::Queued),
                translation_queue::run_after.eq(run_after),
                translation_queue::last_error.eq(Some(error)),
                translation_queue::locked_by.eq(None::<String>),
                translation_queue::locked_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to reschedule job: {}", e)))?;

        Ok(updated == 1)
    }

    async fn mark_failed(&self, job_id: i64, worker_id: &str, reason: &str) -> AppResult<bool> {
        let mut conn = self.get_conn()?;

        let updated = diesel::update(owned_row!(job_id, worker_id))
            .set((
                translation_queue::status.eq(JobStatusDb::Failed),
                translation_queue::last_error.eq(Some(reason)),
                translation_queue::locked_by.eq(None::<String>),
                translation_queue::locked_at.eq(None::<DateTime<Utc>>),
                translation_queue::completed_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark job as failed: {}", e)))?;

        Ok(updated == 1)
    }

    async fn release_stale(&self, stale_after: Duration, now: DateTime<Utc>) -> AppResult<usize> {
        let mut conn = self.get_conn()?;
        let cutoff = now - stale_after;

        let released = diesel::update(
            translation_queue::table
                .filter(translation_queue::status.eq(JobStatusDb::Processing))
                .filter(
                    translation_queue::locked_at
                        .is_null()
                        .or(translation_queue::locked_at.le(cutoff)),
                ),
        )
        .set((
            translation_queue::status.eq(JobStatusDb::Queued),
            translation_queue::locked_by.eq(None::<String>),
            translation_queue::locked_at.eq(None::<DateTime<Utc>>),
            translation_queue::run_after.eq(now),
        ))
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to release stale jobs: {}", e)))?;

        Ok(released)
    }

    async fn reset_queue(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        let reset = diesel::sql_query(
            "UPDATE translation_queue
             SET status = 'queued',
                 locked_by = NULL,
                 locked_at = NULL,
                 attempts = 0,
                 run_after = $1,
                 completed_at = NULL
             WHERE status IN ('processing', 'failed')
                OR (status = 'queued' AND run_after > $1)",
        )
        .bind::<Timestamptz, _>(now)
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to reset queue: {}", e)))?;

        Ok(reset)
    }

    async fn get_by_id(&self, job_id: i64) -> AppResult<Option<TranslationJob>> {
        let mut conn = self.get_conn()?;

        let job: Option<TranslationJobRow> = translation_queue::table
            .find(job_id)
            .select(TranslationJobRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get job by id: {}", e)))?;

        Ok(job.map(TranslationJobRow::into_domain))
    }

    async fn list_jobs(&self, query: &JobQuery) -> AppResult<Vec<TranslationJob>> {
        let mut conn = self.get_conn()?;

        let mut statement = translation_queue::table
            .select(TranslationJobRow::as_select())
            .order((
                translation_queue::priority.desc(),
                translation_queue::run_after.asc(),
                translation_queue::id.asc(),
            ))
            .into_boxed();

        if let Some(status) = query.status {
            statement = statement.filter(translation_queue::status.eq(JobStatusDb::from(status)));
        }
        if let Some(lang) = &query.scope.target_language {
            statement = statement.filter(translation_queue::target_language.eq(lang.clone()));
        }
        if let Some(client) = &query.scope.client_code {
            statement = statement.filter(translation_queue::client_code.eq(client.clone()));
        }
        if let Some(resource_type) = &query.scope.resource_type {
            statement =
                statement.filter(translation_queue::resource_type.eq(resource_type.clone()));
        }
        if let Some(subject) = &query.scope.subject {
            statement = statement.filter(translation_queue::subject.eq(subject.clone()));
        }
        if let Some(variant) = &query.scope.variant {
            statement = statement.filter(translation_queue::variant.eq(variant.clone()));
        }
        if let Some(limit) = query.limit {
            statement = statement.limit(limit_param(limit));
        }

        let rows: Vec<TranslationJobRow> = statement
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to list jobs: {}", e)))?;

        Ok(rows.into_iter().map(TranslationJobRow::into_domain).collect())
    }

    async fn count_by_status(&self, scope: &ScopeFilters) -> AppResult<QueueStatistics> {
        let mut conn = self.get_conn()?;

        let sql = format!(
            "SELECT status, COUNT(*) AS count
             FROM translation_queue
             WHERE {scope}
             GROUP BY status",
            scope = SCOPE_PREDICATE,
        );

        let counts: Vec<StatusCount> = bind_scope(diesel::sql_query(sql).into_boxed(), scope)
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to count jobs: {}", e)))?;

        let mut stats = QueueStatistics::default();
        for row in counts {
            stats.record(JobStatus::from(row.status), row.count);
        }
        Ok(stats)
    }
}
