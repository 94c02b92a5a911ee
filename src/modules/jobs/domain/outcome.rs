/// Per-job results of one processing attempt, and per-run counters.
use serde::Serialize;

/// Whether a failure is worth retrying later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// What should happen to a claimed job after its group was sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Translated(String),
    Retry { reason: String },
    Fail { reason: String },
}

impl JobOutcome {
    pub fn retry(reason: impl Into<String>) -> Self {
        JobOutcome::Retry {
            reason: reason.into(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        JobOutcome::Fail {
            reason: reason.into(),
        }
    }

    pub fn from_failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        match kind {
            FailureKind::Transient => Self::retry(reason),
            FailureKind::Permanent => Self::fail(reason),
        }
    }
}

/// Counters for one `run_once` call, accumulated by the driver across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub claimed: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub failed: usize,
    /// Writes rejected because another worker took the row over.
    pub skipped: usize,
    pub groups: usize,
    pub elapsed_ms: u64,
}

impl RunStats {
    pub fn absorb(&mut self, other: &RunStats) {
        self.claimed += other.claimed;
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.retried += other.retried;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.groups += other.groups;
        self.elapsed_ms += other.elapsed_ms;
    }

    pub fn is_idle(&self) -> bool {
        self.claimed == 0
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "claimed={} attempted={} ok={} retry={} failed={} skipped={} groups={} elapsed_ms={}",
            self.claimed,
            self.attempted,
            self.succeeded,
            self.retried,
            self.failed,
            self.skipped,
            self.groups,
            self.elapsed_ms
        )
    }
}
