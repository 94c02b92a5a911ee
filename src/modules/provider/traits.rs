use crate::modules::jobs::domain::{FailureKind, TextFormat};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Messages that usually describe a condition that clears up on its own.
static TRANSIENT_MESSAGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)timeout|temporar|reset|quota|rate|limit exceeded|exhausted").ok()
});

fn looks_transient(message: &str) -> bool {
    TRANSIENT_MESSAGE
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

/// Batch machine translation backend.
///
/// Implementations return exactly one string per input, in input order, or an error.
/// They never return a partial or reordered list.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Short key used in logs (`google`, `null`).
    fn name(&self) -> &'static str;

    async fn translate(
        &self,
        texts: &[String],
        target_language: &str,
        source_language: &str,
        format: TextFormat,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Why a provider call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Map a non-success HTTP response to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited(message),
            401 => ProviderError::Unauthorized(message),
            // Google reports per-user rate limits and daily quotas as 403.
            403 if looks_transient(&message) => ProviderError::RateLimited(message),
            403 if message.to_lowercase().contains("billing") => {
                ProviderError::QuotaExhausted(message)
            }
            403 => ProviderError::Unauthorized(message),
            408 => ProviderError::Upstream { status, message },
            400..=499 => ProviderError::InvalidRequest(message),
            _ => ProviderError::Upstream { status, message },
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ProviderError::Transport(_)
            | ProviderError::RateLimited(_)
            | ProviderError::MalformedResponse(_) => FailureKind::Transient,
            ProviderError::Upstream { status, message } => {
                if matches!(status, 408 | 429 | 500..=599) || looks_transient(message) {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                }
            }
            ProviderError::Unauthorized(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::QuotaExhausted(_) => FailureKind::Permanent,
        }
    }

    /// Short reason stored on the job row.
    pub fn reason(&self) -> String {
        let reason = self.to_string();
        if reason.chars().count() > 500 {
            let truncated: String = reason.chars().take(500).collect();
            format!("{}...", truncated)
        } else {
            reason
        }
    }
}
