pub mod backoff;
pub mod entities;
pub mod outcome;
pub mod repository;
pub mod scope;
pub mod value_objects;

pub use backoff::{BackoffPolicy, RetryDecision};
pub use entities::{JobStatus, NewTranslationJob, ResourceScope, TextFormat, TranslationJob};
pub use outcome::{FailureKind, JobOutcome, RunStats};
pub use repository::{ClaimRequest, JobQuery, JobStore, QueueStatistics};
pub use scope::ScopeFilters;
pub use value_objects::JobStatusDb;
