/// Diesel models for the translation_queue table
use crate::modules::jobs::domain::entities::{
    NewTranslationJob, ResourceScope, TextFormat, TranslationJob,
};
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::schema::translation_queue;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Diesel model for inserting new jobs
#[derive(Insertable, Debug)]
#[diesel(table_name = translation_queue)]
pub struct NewJobRow {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub format: String,
    pub client_code: String,
    pub resource_type: String,
    pub subject: String,
    pub variant: String,
    pub string_key: String,
    pub priority: i32,
    pub run_after: DateTime<Utc>,
}

impl NewJobRow {
    pub fn from_domain(job: NewTranslationJob, now: DateTime<Utc>) -> Self {
        Self {
            source_text: job.source_text,
            source_language: job.source_language.to_lowercase(),
            target_language: job.target_language.to_lowercase(),
            format: job.format.as_str().to_string(),
            client_code: job.scope.client_code,
            resource_type: job.scope.resource_type,
            subject: job.scope.subject,
            variant: job.scope.variant,
            string_key: job.string_key,
            priority: job.priority,
            run_after: job.run_after.unwrap_or(now),
        }
    }
}

/// Diesel model for querying existing jobs
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = translation_queue)]
pub struct TranslationJobRow {
    pub id: i64,
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub format: String,
    pub client_code: String,
    pub resource_type: String,
    pub subject: String,
    pub variant: String,
    pub string_key: String,
    pub status: JobStatusDb,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub run_after: DateTime<Utc>,
    pub priority: i32,
    pub translated_text: Option<String>,
    pub last_error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TranslationJobRow {
    /// Convert to domain TranslationJob
    pub fn into_domain(self) -> TranslationJob {
        TranslationJob {
            id: self.id,
            source_text: self.source_text,
            source_language: self.source_language,
            target_language: self.target_language,
            // The column has a CHECK constraint; anything else is treated as plain text.
            format: self.format.parse().unwrap_or(TextFormat::Text),
            scope: ResourceScope {
                client_code: self.client_code,
                resource_type: self.resource_type,
                subject: self.subject,
                variant: self.variant,
            },
            string_key: self.string_key,
            status: self.status.into(),
            locked_by: self.locked_by,
            locked_at: self.locked_at,
            attempts: self.attempts,
            run_after: self.run_after,
            priority: self.priority,
            translated_text: self.translated_text,
            last_error: self.last_error,
            queued_at: self.queued_at,
            completed_at: self.completed_at,
        }
    }
}
