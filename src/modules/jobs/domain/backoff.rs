//! Retry scheduling for transiently failed jobs.

use crate::shared::config::{QueueSettings, MAX_BACKOFF};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Exponential backoff keyed on the job's attempt count.
///
/// `attempts` counts the claim that just failed, so the first retry waits `base`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

/// Where a transiently failed job goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAt(DateTime<Utc>),
    GiveUp,
}

impl BackoffPolicy {
    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self {
            base: settings.backoff_base,
            max: settings.backoff_max,
            max_attempts: settings.max_attempts,
        }
    }

    /// `min(base * 2^(attempts-1), max)`, never above [`MAX_BACKOFF`].
    pub fn delay_for(&self, attempts: i32) -> Duration {
        let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
        let cap = self.max.min(MAX_BACKOFF);
        self.base.checked_mul(1u32 << exponent).unwrap_or(cap).min(cap)
    }

    pub fn decide(&self, attempts: i32, now: DateTime<Utc>) -> RetryDecision {
        if attempts >= self.max_attempts as i32 {
            return RetryDecision::GiveUp;
        }
        let at = chrono::Duration::from_std(self.delay_for(attempts))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(now);
        RetryDecision::RetryAt(at)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_settings(&QueueSettings::default())
    }
}
