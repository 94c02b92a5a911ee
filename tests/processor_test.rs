/// Translation queue processor tests against the in-memory store
///
/// Tests cover:
/// - Grouping and the one-call-per-group contract
/// - Per-group failure isolation and retry scheduling
/// - Attempt exhaustion, invalid rows, empty translations
/// - Dry runs, scope filters, stale claim recovery
/// - Claim exclusivity between concurrent processors
mod utils;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mockall::mock;
use std::sync::Arc;
use translation_queue_lib::modules::jobs::{
    InMemoryJobStore, JobStatus, JobStore, ResourceScope, ScopeFilters, TextFormat,
};
use translation_queue_lib::modules::provider::{ProviderError, TranslationProvider};
use utils::factories::{job_by_id, processor, JobFactory, ScriptedProvider};

mock! {
    pub Provider {}

    #[async_trait]
    impl TranslationProvider for Provider {
        fn name(&self) -> &'static str;

        async fn translate(
            &self,
            texts: &[String],
            target_language: &str,
            source_language: &str,
            format: TextFormat,
        ) -> Result<Vec<String>, ProviderError>;
    }
}

// ================================================================================================
// HAPPY PATH
// ================================================================================================

#[tokio::test]
async fn translates_a_group_in_one_provider_call() {
    let store = Arc::new(InMemoryJobStore::new());
    let ids: Vec<i64> = ["Hello", "Goodbye", "Thank you"]
        .iter()
        .map(|text| JobFactory::queued(text).insert(&store))
        .collect();

    let provider = Arc::new(ScriptedProvider::new());
    let p = processor(store.clone(), provider.clone(), "worker-a");

    let stats = p.run_once().await.unwrap();
    assert_eq!(stats.claimed, 3);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.groups, 1);

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].texts, vec!["Hello", "Goodbye", "Thank you"]);
    assert_eq!(calls[0].target_language, "fr");

    for (id, text) in ids.iter().zip(["Hello", "Goodbye", "Thank you"]) {
        let job = job_by_id(&store, *id);
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.translated_text.as_deref(), Some(format!("fr:{}", text).as_str()));
        assert_eq!(job.locked_by, None);
        assert!(job.completed_at.is_some());
    }
}

#[tokio::test]
async fn groups_by_language_pair_and_format() {
    let store = Arc::new(InMemoryJobStore::new());
    JobFactory::queued("One").target("fr").insert(&store);
    JobFactory::queued("Two").target("de").insert(&store);
    JobFactory::queued("<b>Three</b>").target("fr").html().insert(&store);
    JobFactory::queued("Four").target("fr").insert(&store);
    JobFactory::queued("Cinq").source("fr").target("en").insert(&store);

    let provider = Arc::new(ScriptedProvider::new());
    let stats = processor(store.clone(), provider.clone(), "worker-a")
        .run_once()
        .await
        .unwrap();

    assert_eq!(stats.groups, 4);
    assert_eq!(stats.succeeded, 5);

    let calls = provider.calls();
    assert_eq!(calls.len(), 4);
    let fr_text = calls
        .iter()
        .find(|c| c.target_language == "fr" && c.format == TextFormat::Text)
        .unwrap();
    assert_eq!(fr_text.texts, vec!["One", "Four"]);
    let fr_html = calls
        .iter()
        .find(|c| c.target_language == "fr" && c.format == TextFormat::Html)
        .unwrap();
    assert_eq!(fr_html.texts, vec!["<b>Three</b>"]);
    let back_to_en = calls.iter().find(|c| c.target_language == "en").unwrap();
    assert_eq!(back_to_en.source_language, "fr");
}

#[tokio::test]
async fn each_job_gets_its_own_translation() {
    let store = Arc::new(InMemoryJobStore::new());
    let first = JobFactory::queued("apple").insert(&store);
    let second = JobFactory::queued("banana").insert(&store);
    let third = JobFactory::queued("cherry").insert(&store);

    let provider = Arc::new(
        ScriptedProvider::new()
            .translating("apple", "pomme")
            .translating("banana", "banane")
            .translating("cherry", "cerise"),
    );
    processor(store.clone(), provider, "worker-a")
        .run_once()
        .await
        .unwrap();

    assert_eq!(job_by_id(&store, first).translated_text.as_deref(), Some("pomme"));
    assert_eq!(job_by_id(&store, second).translated_text.as_deref(), Some("banane"));
    assert_eq!(job_by_id(&store, third).translated_text.as_deref(), Some("cerise"));
}

#[tokio::test]
async fn claims_highest_priority_first_within_batch_size() {
    let store = Arc::new(InMemoryJobStore::new());
    let low = JobFactory::queued("low").priority(0).insert(&store);
    let high = JobFactory::queued("high").priority(5).insert(&store);
    let mid = JobFactory::queued("mid").priority(1).insert(&store);

    let provider = Arc::new(ScriptedProvider::new());
    let mut p = processor(store.clone(), provider.clone(), "worker-a");
    assert!(p.set_batch_size(2));

    let stats = p.run_once().await.unwrap();
    assert_eq!(stats.claimed, 2);
    assert_eq!(provider.calls()[0].texts, vec!["high", "mid"]);
    assert_eq!(job_by_id(&store, high).status, JobStatus::Done);
    assert_eq!(job_by_id(&store, mid).status, JobStatus::Done);
    assert_eq!(job_by_id(&store, low).status, JobStatus::Queued);
}

#[tokio::test]
async fn empty_queue_is_idle() {
    let store = Arc::new(InMemoryJobStore::new());
    let provider = Arc::new(ScriptedProvider::new());

    let stats = processor(store.clone(), provider.clone(), "worker-a")
        .run_once()
        .await
        .unwrap();

    assert!(stats.is_idle());
    assert!(provider.calls().is_empty());
    assert_eq!(store.writes().unwrap(), 0);
}

// ================================================================================================
// FAILURES AND RETRIES
// ================================================================================================

#[tokio::test]
async fn failing_group_does_not_affect_other_groups() {
    let store = Arc::new(InMemoryJobStore::new());
    let fr = JobFactory::queued("Hello").target("fr").insert(&store);
    let de = JobFactory::queued("Hello").target("de").insert(&store);

    let provider = Arc::new(
        ScriptedProvider::new()
            .failing_for("fr", ProviderError::RateLimited("User Rate Limit Exceeded".into())),
    );
    let now = Utc::now();
    let stats = processor(store.clone(), provider, "worker-a")
        .run_once_at(now)
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.failed, 0);

    let de_job = job_by_id(&store, de);
    assert_eq!(de_job.status, JobStatus::Done);
    assert_eq!(de_job.translated_text.as_deref(), Some("de:Hello"));

    let fr_job = job_by_id(&store, fr);
    assert_eq!(fr_job.status, JobStatus::Queued);
    assert_eq!(fr_job.attempts, 1);
    assert_eq!(fr_job.run_after, now + Duration::seconds(60));
    assert_eq!(fr_job.locked_by, None);
    assert!(fr_job.last_error.unwrap().contains("User Rate Limit Exceeded"));
}

#[tokio::test]
async fn permanent_failure_fails_the_group() {
    let store = Arc::new(InMemoryJobStore::new());
    let id = JobFactory::queued("Hello").insert(&store);

    let provider = Arc::new(
        ScriptedProvider::new().failing_for("fr", ProviderError::Unauthorized("API key not valid".into())),
    );
    let stats = processor(store.clone(), provider, "worker-a")
        .run_once()
        .await
        .unwrap();

    assert_eq!(stats.failed, 1);
    let job = job_by_id(&store, id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.last_error.unwrap().contains("API key not valid"));
}

#[tokio::test]
async fn retry_delay_grows_until_attempts_run_out() {
    let store = Arc::new(InMemoryJobStore::new());
    let id = JobFactory::queued("Hello").insert(&store);

    let provider = Arc::new(
        ScriptedProvider::new().failing_for("fr", ProviderError::Transport("connection reset".into())),
    );
    let p = processor(store.clone(), provider.clone(), "worker-a");

    let t0 = Utc::now();
    p.run_once_at(t0).await.unwrap();
    let job = job_by_id(&store, id);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.run_after, t0 + Duration::seconds(60));

    // Not due yet.
    let early = p.run_once_at(t0 + Duration::seconds(30)).await.unwrap();
    assert!(early.is_idle());

    let t1 = t0 + Duration::seconds(60);
    p.run_once_at(t1).await.unwrap();
    let job = job_by_id(&store, id);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.run_after, t1 + Duration::seconds(120));

    // Third claim reaches max_attempts = 3.
    let t2 = t1 + Duration::seconds(120);
    let stats = p.run_once_at(t2).await.unwrap();
    assert_eq!(stats.failed, 1);
    let job = job_by_id(&store, id);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.last_error.unwrap().starts_with("max-attempts ("));
    assert_eq!(provider.calls().len(), 3);
}

#[tokio::test]
async fn job_with_exhausted_attempts_fails_on_transient_error() {
    let store = Arc::new(InMemoryJobStore::new());
    let id = JobFactory::queued("Hello").attempts(2).insert(&store);

    let provider = Arc::new(
        ScriptedProvider::new().failing_for("fr", ProviderError::Upstream {
            status: 503,
            message: "Backend Error".into(),
        }),
    );
    processor(store.clone(), provider, "worker-a")
        .run_once()
        .await
        .unwrap();

    let job = job_by_id(&store, id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.last_error.unwrap().contains("Backend Error"));
}

#[tokio::test]
async fn empty_translation_is_retried() {
    let store = Arc::new(InMemoryJobStore::new());
    let blank = JobFactory::queued("Hello").insert(&store);
    let fine = JobFactory::queued("World").insert(&store);

    let provider = Arc::new(ScriptedProvider::new().translating("Hello", "  "));
    let stats = processor(store.clone(), provider, "worker-a")
        .run_once()
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.retried, 1);

    let job = job_by_id(&store, blank);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.last_error.as_deref(), Some("empty-translation"));
    assert_eq!(job_by_id(&store, fine).status, JobStatus::Done);
}

#[tokio::test]
async fn invalid_row_fails_without_provider_call() {
    let store = Arc::new(InMemoryJobStore::new());
    let id = JobFactory::queued("   ").insert(&store);

    let mut provider = MockProvider::new();
    provider.expect_name().return_const("mock");
    provider.expect_translate().never();

    let stats = processor(store.clone(), Arc::new(provider), "worker-a")
        .run_once()
        .await
        .unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.groups, 0);
    let job = job_by_id(&store, id);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.last_error.as_deref(), Some("invalid-queue-row"));
}

#[tokio::test]
async fn short_provider_response_is_retried() {
    let store = Arc::new(InMemoryJobStore::new());
    let first = JobFactory::queued("one").insert(&store);
    let second = JobFactory::queued("two").insert(&store);

    let mut provider = MockProvider::new();
    provider.expect_name().return_const("mock");
    provider
        .expect_translate()
        .withf(|texts, target, source, format| {
            texts.len() == 2 && target == "fr" && source == "en" && *format == TextFormat::Text
        })
        .times(1)
        .returning(|_, _, _, _| Ok(vec!["un".to_string()]));

    let stats = processor(store.clone(), Arc::new(provider), "worker-a")
        .run_once()
        .await
        .unwrap();

    assert_eq!(stats.retried, 2);
    for id in [first, second] {
        let job = job_by_id(&store, id);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.translated_text, None);
        assert!(job.last_error.unwrap().contains("malformed response"));
    }
}

/// Resets the queue mid-call, so the processor no longer owns what it claimed.
struct ClaimStealingProvider {
    store: Arc<InMemoryJobStore>,
}

#[async_trait]
impl TranslationProvider for ClaimStealingProvider {
    fn name(&self) -> &'static str {
        "stealing"
    }

    async fn translate(
        &self,
        texts: &[String],
        _target_language: &str,
        _source_language: &str,
        _format: TextFormat,
    ) -> Result<Vec<String>, ProviderError> {
        self.store.reset_queue(Utc::now()).await.unwrap();
        Ok(texts.to_vec())
    }
}

#[tokio::test]
async fn lost_claim_is_skipped_not_overwritten() {
    let store = Arc::new(InMemoryJobStore::new());
    let id = JobFactory::queued("Hello").insert(&store);

    let provider = Arc::new(ClaimStealingProvider {
        store: store.clone(),
    });
    let stats = processor(store.clone(), provider, "worker-a")
        .run_once()
        .await
        .unwrap();

    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.skipped, 1);
    let job = job_by_id(&store, id);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.translated_text, None);
}

// ================================================================================================
// DRY RUN, SCOPE, STALE CLAIMS
// ================================================================================================

#[tokio::test]
async fn dry_run_changes_nothing() {
    let store = Arc::new(InMemoryJobStore::new());
    JobFactory::queued("Hello").target("fr").insert(&store);
    JobFactory::queued("Hello").target("de").insert(&store);
    let before = store.snapshot().unwrap();
    let writes_before = store.writes().unwrap();

    let mut provider = MockProvider::new();
    provider.expect_name().return_const("mock");
    provider.expect_translate().never();

    let mut p = processor(store.clone(), Arc::new(provider), "worker-a");
    p.set_dry_run(true);

    let stats = p.run_once().await.unwrap();
    assert_eq!(stats.claimed, 2);
    assert_eq!(stats.groups, 2);
    assert_eq!(stats.succeeded, 0);
    assert_eq!(store.snapshot().unwrap(), before);
    assert_eq!(store.writes().unwrap(), writes_before);
}

#[tokio::test]
async fn scope_filters_restrict_claims() {
    let store = Arc::new(InMemoryJobStore::new());
    let lesson = ResourceScope::new("acme", "lesson", "", "");
    let interface = ResourceScope::new("acme", "interface", "", "");

    let fr_lesson = JobFactory::queued("a").target("fr").scope(lesson.clone()).insert(&store);
    let de_lesson = JobFactory::queued("b").target("de").scope(lesson).insert(&store);
    let fr_interface = JobFactory::queued("c").target("fr").scope(interface).insert(&store);

    let provider = Arc::new(ScriptedProvider::new());
    let mut p = processor(store.clone(), provider, "worker-a");
    p.set_scope_filters(ScopeFilters::from_pairs([("lang", "fr"), ("type", "lesson")]));

    let stats = p.run_once().await.unwrap();
    assert_eq!(stats.claimed, 1);
    assert_eq!(job_by_id(&store, fr_lesson).status, JobStatus::Done);
    assert_eq!(job_by_id(&store, de_lesson).status, JobStatus::Queued);
    assert_eq!(job_by_id(&store, fr_interface).status, JobStatus::Queued);
}

#[tokio::test]
async fn group_by_scope_splits_provider_calls() {
    let store = Arc::new(InMemoryJobStore::new());
    JobFactory::queued("a").scope(ResourceScope::new("acme", "lesson", "", "")).insert(&store);
    JobFactory::queued("b").scope(ResourceScope::new("acme", "interface", "", "")).insert(&store);

    let provider = Arc::new(ScriptedProvider::new());
    let mut p = processor(store.clone(), provider.clone(), "worker-a");
    p.set_group_by_scope(true);

    let stats = p.run_once().await.unwrap();
    assert_eq!(stats.groups, 2);
    assert_eq!(provider.calls().len(), 2);
}

#[tokio::test]
async fn stale_claim_is_taken_over_fresh_claim_is_not() {
    let store = Arc::new(InMemoryJobStore::new());
    let now = Utc::now();
    let stale = JobFactory::queued("stale")
        .attempts(1)
        .processing("worker-dead", now - Duration::minutes(11))
        .insert(&store);
    let fresh = JobFactory::queued("fresh")
        .attempts(1)
        .processing("worker-busy", now - Duration::minutes(1))
        .insert(&store);

    let provider = Arc::new(ScriptedProvider::new());
    let stats = processor(store.clone(), provider, "worker-a")
        .run_once_at(now)
        .await
        .unwrap();

    assert_eq!(stats.claimed, 1);
    let stale_job = job_by_id(&store, stale);
    assert_eq!(stale_job.status, JobStatus::Done);
    assert_eq!(stale_job.attempts, 2);

    let fresh_job = job_by_id(&store, fresh);
    assert_eq!(fresh_job.status, JobStatus::Processing);
    assert_eq!(fresh_job.locked_by.as_deref(), Some("worker-busy"));
}

#[tokio::test]
async fn terminal_and_future_jobs_are_not_claimed() {
    let store = Arc::new(InMemoryJobStore::new());
    JobFactory::queued("done").status(JobStatus::Done).insert(&store);
    JobFactory::queued("failed").status(JobStatus::Failed).insert(&store);
    JobFactory::queued("later")
        .run_after(Utc::now() + Duration::hours(1))
        .insert(&store);

    let provider = Arc::new(ScriptedProvider::new());
    let stats = processor(store.clone(), provider, "worker-a")
        .run_once()
        .await
        .unwrap();
    assert!(stats.is_idle());
}

// ================================================================================================
// CONCURRENCY
// ================================================================================================

#[tokio::test]
async fn concurrent_processors_never_share_a_job() {
    let store = Arc::new(InMemoryJobStore::new());
    for i in 0..10 {
        JobFactory::queued(&format!("text {}", i)).insert(&store);
    }

    let provider_a = Arc::new(ScriptedProvider::new());
    let provider_b = Arc::new(ScriptedProvider::new());
    let mut a = processor(store.clone(), provider_a.clone(), "worker-a");
    let mut b = processor(store.clone(), provider_b.clone(), "worker-b");
    a.set_batch_size(6);
    b.set_batch_size(6);

    let (stats_a, stats_b) = futures::join!(a.run_once(), b.run_once());
    let (stats_a, stats_b) = (stats_a.unwrap(), stats_b.unwrap());

    assert_eq!(stats_a.succeeded + stats_b.succeeded, 10);
    assert_eq!(stats_a.skipped + stats_b.skipped, 0);

    let mut sent: Vec<String> = provider_a
        .calls()
        .into_iter()
        .chain(provider_b.calls())
        .flat_map(|call| call.texts)
        .collect();
    assert_eq!(sent.len(), 10);
    sent.sort();
    sent.dedup();
    assert_eq!(sent.len(), 10);

    assert!(store
        .snapshot()
        .unwrap()
        .iter()
        .all(|job| job.status == JobStatus::Done && job.attempts == 1));
}
