/// Domain entities for the translation queue
///
/// A job is one source string to be translated into one target language,
/// optionally tagged with the resource scope it belongs to.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Job status enum matching database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// `done` and `failed` are never left by the processor.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Payload format handed to the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    #[default]
    Text,
    Html,
}

impl TextFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextFormat::Text => "text",
            TextFormat::Html => "html",
        }
    }
}

impl std::fmt::Display for TextFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TextFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "" => Ok(TextFormat::Text),
            "html" => Ok(TextFormat::Html),
            _ => Err(format!("Invalid text format: {}", s)),
        }
    }
}

/// Optional dimensions a job belongs to. Empty strings mean "unscoped".
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceScope {
    pub client_code: String,
    pub resource_type: String,
    pub subject: String,
    pub variant: String,
}

impl ResourceScope {
    pub fn new(client_code: &str, resource_type: &str, subject: &str, variant: &str) -> Self {
        Self {
            client_code: client_code.to_string(),
            resource_type: resource_type.to_string(),
            subject: subject.to_string(),
            variant: variant.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_code.is_empty()
            && self.resource_type.is_empty()
            && self.subject.is_empty()
            && self.variant.is_empty()
    }
}

impl std::fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.client_code, self.resource_type, self.subject, self.variant
        )
    }
}

/// New job to be queued (before insertion to database)
#[derive(Debug, Clone)]
pub struct NewTranslationJob {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub format: TextFormat,
    pub scope: ResourceScope,
    pub string_key: String,
    pub priority: i32,
    /// Defaults to "now" in the store.
    pub run_after: Option<DateTime<Utc>>,
}

impl NewTranslationJob {
    pub fn new(source_text: &str, target_language: &str) -> Self {
        Self {
            source_text: source_text.to_string(),
            source_language: "en".to_string(),
            target_language: target_language.to_string(),
            format: TextFormat::Text,
            scope: ResourceScope::default(),
            string_key: String::new(),
            priority: 0,
            run_after: None,
        }
    }

    pub fn from_language(mut self, source_language: &str) -> Self {
        self.source_language = source_language.to_string();
        self
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_scope(mut self, scope: ResourceScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_key(mut self, string_key: &str) -> Self {
        self.string_key = string_key.to_string();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn due_at(mut self, run_after: DateTime<Utc>) -> Self {
        self.run_after = Some(run_after);
        self
    }

    /// Translating into the source language is never queued.
    pub fn is_same_language(&self) -> bool {
        self.source_language.eq_ignore_ascii_case(&self.target_language)
    }
}

/// Job record from the store (with queue metadata)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationJob {
    pub id: i64,
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub format: TextFormat,
    pub scope: ResourceScope,
    pub string_key: String,
    pub status: JobStatus,
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

impl TranslationJob {
    /// A processing row whose claim is older than `stale_after` belongs to a dead worker.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.status == JobStatus::Processing
            && self.locked_at.map_or(true, |at| at <= now - stale_after)
    }

    /// The claim predicate shared by every store implementation.
    pub fn is_claimable(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        match self.status {
            JobStatus::Queued => self.run_after <= now,
            JobStatus::Processing => self.is_stale(now, stale_after),
            JobStatus::Done | JobStatus::Failed => false,
        }
    }

    pub fn is_owned_by(&self, worker_id: &str) -> bool {
        self.status == JobStatus::Processing && self.locked_by.as_deref() == Some(worker_id)
    }

    /// Rows that can never be translated. Returns the failure reason.
    pub fn validation_error(&self) -> Option<&'static str> {
        if self.source_text.trim().is_empty() || self.target_language.trim().is_empty() {
            Some("invalid-queue-row")
        } else {
            None
        }
    }
}
