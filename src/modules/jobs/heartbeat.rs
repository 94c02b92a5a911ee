use crate::shared::errors::AppResult;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// File rewritten with the current time on every driver iteration, for external
/// "is the cron alive" checks.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    path: PathBuf,
}

impl Heartbeat {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn touch(&self) -> AppResult<()> {
        self.touch_at(Utc::now())
    }

    pub fn touch_at(&self, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, format!("{}\n", now.to_rfc3339()))?;
        Ok(())
    }

    /// `None` if the file is missing or unreadable.
    pub fn last_beat(&self) -> Option<DateTime<Utc>> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }
}
