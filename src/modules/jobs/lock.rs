//! Single-instance guards for cron runs.

use crate::log_debug;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::{Database, DbConnection};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool};
use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Non-blocking mutual exclusion between processor instances.
#[async_trait]
pub trait ProcessLock: Send {
    /// `Ok(false)` means another instance holds the lock; that is not an error.
    async fn try_acquire(&mut self) -> AppResult<bool>;

    /// Release if held. Safe to call more than once.
    async fn release(&mut self) -> AppResult<()>;

    fn describe(&self) -> String;
}

/// Exclusive `flock` on a lock file. The lock dies with the process.
#[derive(Debug)]
pub struct FileProcessLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileProcessLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    fn open(&self) -> AppResult<File> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| {
                AppError::LockError(format!(
                    "Cannot open lock file {}: {}",
                    self.path.display(),
                    e
                ))
            })
    }
}

#[async_trait]
impl ProcessLock for FileProcessLock {
    async fn try_acquire(&mut self) -> AppResult<bool> {
        if self.file.is_some() {
            return Ok(true);
        }

        let mut file = self.open()?;
        match file.try_lock() {
            Ok(()) => {
                // Owner pid for whoever inspects a stuck lock file.
                file.set_len(0)?;
                writeln!(file, "{}", std::process::id())?;
                self.file = Some(file);
                log_debug!("lock.acquired file={}", self.path.display());
                Ok(true)
            }
            Err(TryLockError::WouldBlock) => Ok(false),
            Err(TryLockError::Error(e)) => Err(AppError::LockError(format!(
                "Cannot lock {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn release(&mut self) -> AppResult<()> {
        if let Some(file) = self.file.take() {
            file.unlock().map_err(|e| {
                AppError::LockError(format!("Cannot unlock {}: {}", self.path.display(), e))
            })?;
            log_debug!("lock.released file={}", self.path.display());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[derive(QueryableByName)]
struct AdvisoryResult {
    #[diesel(sql_type = Bool)]
    acquired: bool,
}

/// Stable advisory lock key derived from a name (FNV-1a).
pub fn advisory_key(name: &str) -> i64 {
    let hash = name.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    });
    hash as i64
}

/// Session-level `pg_try_advisory_lock`, held on a dedicated pooled connection.
pub struct AdvisoryProcessLock {
    database: Database,
    name: String,
    key: i64,
    conn: Option<DbConnection>,
}

impl AdvisoryProcessLock {
    pub fn new(database: Database, name: &str) -> Self {
        Self {
            database,
            name: name.to_string(),
            key: advisory_key(name),
            conn: None,
        }
    }
}

#[async_trait]
impl ProcessLock for AdvisoryProcessLock {
    async fn try_acquire(&mut self) -> AppResult<bool> {
        if self.conn.is_some() {
            return Ok(true);
        }

        let mut conn = self.database.get_connection()?;
        let result: AdvisoryResult = diesel::sql_query("SELECT pg_try_advisory_lock($1) AS acquired")
            .bind::<BigInt, _>(self.key)
            .get_result(&mut conn)
            .map_err(|e| AppError::LockError(format!("Advisory lock query failed: {}", e)))?;

        if result.acquired {
            self.conn = Some(conn);
            log_debug!("lock.acquired advisory={} key={}", self.name, self.key);
        }
        Ok(result.acquired)
    }

    async fn release(&mut self) -> AppResult<()> {
        if let Some(mut conn) = self.conn.take() {
            diesel::sql_query("SELECT pg_advisory_unlock($1) AS acquired")
                .bind::<BigInt, _>(self.key)
                .get_result::<AdvisoryResult>(&mut conn)
                .map_err(|e| AppError::LockError(format!("Advisory unlock failed: {}", e)))?;
            log_debug!("lock.released advisory={}", self.name);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("advisory:{}", self.name)
    }
}
