/// Application configuration, built once at startup and passed down explicitly.
///
/// Values come from the process environment (after `.env` is loaded by `dotenvy`).
/// `from_lookup` takes any key lookup so tests can build deterministic configs.
use crate::shared::errors::{AppError, AppResult};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOCK_FILE: &str = "logs/translation-cron.lock";
const DEFAULT_HEARTBEAT_FILE: &str = "logs/translation-cron.last";
/// Longest retry delay accepted from the environment or applied by the backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const DEFAULT_GOOGLE_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Which mutual-exclusion primitive guards a cron run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    /// Non-blocking exclusive `flock` on `LOCK_FILE`.
    File,
    /// `pg_try_advisory_lock` on the job database.
    Advisory,
}

impl std::str::FromStr for LockBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" | "flock" => Ok(LockBackend::File),
            "advisory" | "db" | "database" => Ok(LockBackend::Advisory),
            other => Err(format!("Invalid lock backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// `AUTO_MT_ENABLED`; when false the null provider is always used.
    pub auto_mt_enabled: bool,
    /// `TRANSLATION_PROVIDER`, lower-cased. `None` means "environment default".
    pub provider: Option<String>,
    pub google_api_key: Option<String>,
    pub google_endpoint: String,
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    pub log_file: Option<PathBuf>,
    pub lock_file: PathBuf,
    pub heartbeat_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub stale_lock_after: Duration,
    pub max_batch_size: usize,
    pub group_by_scope: bool,
    pub lock_backend: LockBackend,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            backoff_base: Duration::from_secs(60),
            backoff_max: Duration::from_secs(6 * 60 * 60),
            stale_lock_after: Duration::from_secs(10 * 60),
            max_batch_size: 500,
            group_by_scope: false,
            lock_backend: LockBackend::File,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `APP_ENV`, lower-cased (`local`, `dev`, `staging`, `production`, ...).
    pub environment: String,
    pub database_url: Option<String>,
    pub provider: ProviderSettings,
    pub paths: PathSettings,
    pub queue: QueueSettings,
    pub log_timezone: Tz,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = get("APP_ENV")
            .map(|v| v.to_lowercase())
            .unwrap_or_else(|| "remote".to_string());

        let database_url = match get("DATABASE_URL") {
            Some(url) => Some(validate_database_url(url)?),
            None => None,
        };

        let provider = ProviderSettings {
            auto_mt_enabled: get("AUTO_MT_ENABLED")
                .map(|v| parse_bool(&v).unwrap_or(true))
                .unwrap_or(true),
            provider: get("TRANSLATION_PROVIDER").map(|v| v.to_lowercase()),
            google_api_key: get("GOOGLE_TRANSLATE_API_KEY"),
            google_endpoint: get("GOOGLE_TRANSLATE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_GOOGLE_ENDPOINT.to_string()),
        };

        let log_file = get("LOG_FILE").map(PathBuf::from);
        let lock_file = match (get("LOCK_FILE"), &log_file) {
            (Some(lock), _) => PathBuf::from(lock),
            (None, Some(log)) => {
                let mut lock = log.clone().into_os_string();
                lock.push(".lock");
                PathBuf::from(lock)
            }
            (None, None) => PathBuf::from(DEFAULT_LOCK_FILE),
        };
        let paths = PathSettings {
            log_file,
            lock_file,
            heartbeat_file: get("HEARTBEAT_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HEARTBEAT_FILE)),
        };

        let defaults = QueueSettings::default();
        let queue = QueueSettings {
            max_attempts: positive_or(get("TQ_MAX_ATTEMPTS"), defaults.max_attempts as u64)? as u32,
            backoff_base: Duration::from_secs(positive_or(
                get("TQ_BACKOFF_BASE_SECS"),
                defaults.backoff_base.as_secs(),
            )?),
            backoff_max: Duration::from_secs(positive_or(
                get("TQ_BACKOFF_MAX_SECS"),
                defaults.backoff_max.as_secs(),
            )?),
            stale_lock_after: Duration::from_secs(positive_or(
                get("TQ_STALE_LOCK_SECS"),
                defaults.stale_lock_after.as_secs(),
            )?),
            max_batch_size: positive_or(
                get("TQ_MAX_BATCH_SIZE"),
                defaults.max_batch_size as u64,
            )? as usize,
            group_by_scope: get("TQ_GROUP_BY_SCOPE")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.group_by_scope),
            lock_backend: match get("TQ_LOCK_BACKEND") {
                Some(v) => v.parse().map_err(AppError::ConfigError)?,
                None => defaults.lock_backend,
            },
        };

        for (name, value) in [
            ("TQ_BACKOFF_BASE_SECS", queue.backoff_base),
            ("TQ_BACKOFF_MAX_SECS", queue.backoff_max),
        ] {
            if value > MAX_BACKOFF {
                return Err(AppError::ConfigError(format!(
                    "{} ({}) must not exceed {} seconds",
                    name,
                    value.as_secs(),
                    MAX_BACKOFF.as_secs()
                )));
            }
        }

        if queue.backoff_max < queue.backoff_base {
            return Err(AppError::ConfigError(format!(
                "TQ_BACKOFF_MAX_SECS ({}) must not be below TQ_BACKOFF_BASE_SECS ({})",
                queue.backoff_max.as_secs(),
                queue.backoff_base.as_secs()
            )));
        }

        let log_timezone = match get("LOG_TIMEZONE") {
            Some(tz) => tz
                .parse::<Tz>()
                .map_err(|e| AppError::ConfigError(format!("Invalid LOG_TIMEZONE '{}': {}", tz, e)))?,
            None => chrono_tz::Australia::Sydney,
        };

        Ok(Self {
            environment,
            database_url,
            provider,
            paths,
            queue,
            log_timezone,
        })
    }

    /// `local` and `dev` never reach a paid provider unless explicitly asked to.
    pub fn is_local(&self) -> bool {
        matches!(self.environment.as_str(), "local" | "dev")
    }

    pub fn require_database_url(&self) -> AppResult<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            AppError::ConfigError("DATABASE_URL environment variable not found".to_string())
        })
    }
}

/// Accepts `1/true/yes/on` and `0/false/no/off`, case-insensitive.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn positive_or(raw: Option<String>, default: u64) -> AppResult<u64> {
    match raw {
        None => Ok(default),
        Some(v) => {
            let n: u64 = v.parse()?;
            Ok(if n == 0 { default } else { n })
        }
    }
}

fn validate_database_url(url: String) -> AppResult<String> {
    if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
        return Err(AppError::ConfigError(
            "Invalid database URL format. Must start with postgres:// or postgresql://"
                .to_string(),
        ));
    }
    Ok(url)
}
