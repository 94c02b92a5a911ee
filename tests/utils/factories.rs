/// Test data factories using builder pattern
///
/// Provides queue rows with sensible defaults and scripted translation providers.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use translation_queue_lib::modules::jobs::{
    InMemoryJobStore, JobStatus, ResourceScope, TextFormat, TranslationJob,
    TranslationQueueProcessor,
};
use translation_queue_lib::modules::provider::{ProviderError, TranslationProvider};
use translation_queue_lib::shared::config::QueueSettings;

pub struct JobFactory {
    job: TranslationJob,
}

impl JobFactory {
    /// A due `queued` en>fr plain-text job.
    pub fn queued(text: &str) -> Self {
        let now = Utc::now();
        Self {
            job: TranslationJob {
                id: 0,
                source_text: text.to_string(),
                source_language: "en".to_string(),
                target_language: "fr".to_string(),
                format: TextFormat::Text,
                scope: ResourceScope::default(),
                string_key: String::new(),
                status: JobStatus::Queued,
                locked_by: None,
                locked_at: None,
                attempts: 0,
                run_after: now - chrono::Duration::seconds(1),
                priority: 0,
                translated_text: None,
                last_error: None,
                queued_at: now,
                completed_at: None,
            },
        }
    }

    pub fn target(mut self, language: &str) -> Self {
        self.job.target_language = language.to_string();
        self
    }

    pub fn source(mut self, language: &str) -> Self {
        self.job.source_language = language.to_string();
        self
    }

    pub fn html(mut self) -> Self {
        self.job.format = TextFormat::Html;
        self
    }

    pub fn scope(mut self, scope: ResourceScope) -> Self {
        self.job.scope = scope;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn attempts(mut self, attempts: i32) -> Self {
        self.job.attempts = attempts;
        self
    }

    pub fn run_after(mut self, run_after: DateTime<Utc>) -> Self {
        self.job.run_after = run_after;
        self
    }

    /// Claimed by `worker` at `locked_at`.
    pub fn processing(mut self, worker: &str, locked_at: DateTime<Utc>) -> Self {
        self.job.status = JobStatus::Processing;
        self.job.locked_by = Some(worker.to_string());
        self.job.locked_at = Some(locked_at);
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn build(self) -> TranslationJob {
        self.job
    }

    pub fn insert(self, store: &InMemoryJobStore) -> i64 {
        store.insert(self.job).expect("insert job")
    }
}

/// Small, fast settings for tests: backoff 60s..3600s, 3 attempts, 10 min stale.
pub fn test_settings() -> QueueSettings {
    QueueSettings {
        max_attempts: 3,
        backoff_base: std::time::Duration::from_secs(60),
        backoff_max: std::time::Duration::from_secs(3600),
        ..QueueSettings::default()
    }
}

pub fn processor(
    store: Arc<InMemoryJobStore>,
    provider: Arc<dyn TranslationProvider>,
    worker: &str,
) -> TranslationQueueProcessor {
    TranslationQueueProcessor::new(store, provider, &test_settings(), worker)
}

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub source_language: String,
    pub target_language: String,
    pub format: TextFormat,
    pub texts: Vec<String>,
}

/// Translates to `"<target>:<text>"` unless a failure is scripted for the target.
#[derive(Default)]
pub struct ScriptedProvider {
    failures: HashMap<String, ProviderError>,
    overrides: HashMap<String, String>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, target_language: &str, error: ProviderError) -> Self {
        self.failures.insert(target_language.to_string(), error);
        self
    }

    /// Return `translation` whenever `source_text` is sent.
    pub fn translating(mut self, source_text: &str, translation: &str) -> Self {
        self.overrides
            .insert(source_text.to_string(), translation.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().expect("calls mutex").clone()
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn translate(
        &self,
        texts: &[String],
        target_language: &str,
        source_language: &str,
        format: TextFormat,
    ) -> Result<Vec<String>, ProviderError> {
        self.calls.lock().expect("calls mutex").push(ProviderCall {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            format,
            texts: texts.to_vec(),
        });

        if let Some(error) = self.failures.get(target_language) {
            return Err(error.clone());
        }

        Ok(texts
            .iter()
            .map(|text| {
                self.overrides
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| format!("{}:{}", target_language, text))
            })
            .collect())
    }
}

pub fn job_by_id(store: &InMemoryJobStore, id: i64) -> TranslationJob {
    store
        .snapshot()
        .expect("snapshot")
        .into_iter()
        .find(|job| job.id == id)
        .expect("job exists")
}
