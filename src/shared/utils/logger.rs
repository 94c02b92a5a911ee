use chrono::Utc;
use chrono_tz::Tz;
use log::{debug, error, info};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

/// Where log lines go and how their timestamps are rendered.
#[derive(Debug, Clone)]
pub struct LoggerSettings {
    pub log_file: Option<PathBuf>,
    pub timezone: Tz,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            log_file: None,
            timezone: chrono_tz::UTC,
        }
    }
}

/// Writes every line to stdout and, when configured, appends it to the log file,
/// so cron mail and the project log both see the same output.
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Initialize the logging system
/// This should be called once at application startup
pub fn init_logger(settings: &LoggerSettings) {
    INIT.call_once(|| {
        let file = match settings.log_file.as_deref().map(open_log_file) {
            Some(Ok(file)) => Some(file),
            Some(Err(e)) => {
                eprintln!("Warning: could not open log file, logging to stdout only: {}", e);
                None
            }
            None => None,
        };
        let timezone = settings.timezone;

        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info) // Default level
            .filter_module("translation_queue_lib", log::LevelFilter::Debug) // More verbose for our crate
            .filter_module("diesel", log::LevelFilter::Warn) // Reduce diesel noise
            .filter_module("reqwest", log::LevelFilter::Warn) // Reduce HTTP noise
            .filter_module("hyper", log::LevelFilter::Warn)
            .filter_module("tokio", log::LevelFilter::Warn) // Reduce tokio noise
            .parse_env("RUST_LOG")
            .format(move |buf, record| {
                writeln!(
                    buf,
                    "[{}] {:<5} {}",
                    Utc::now().with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S%:z"),
                    record.level(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
            .init();

        info!("logger.init file={:?} tz={}", settings.log_file, timezone);
    });
}

/// Macro for structured logging with context
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

/// Structured logging helpers for common patterns
pub struct LogContext;

impl LogContext {
    /// Log database operations
    pub fn db_operation(operation: &str, table: &str, duration_ms: Option<u64>) {
        match duration_ms {
            Some(duration) => debug!(
                "db.op op={} table={} elapsed_ms={}",
                operation, table, duration
            ),
            None => debug!("db.op.start op={} table={}", operation, table),
        }
    }

    /// Log translation provider calls
    pub fn provider_call(provider: &str, group: &str, texts: usize, duration_ms: Option<u64>) {
        match duration_ms {
            Some(duration) => info!(
                "provider.call provider={} group={} texts={} elapsed_ms={}",
                provider, group, texts, duration
            ),
            None => debug!(
                "provider.call.start provider={} group={} texts={}",
                provider, group, texts
            ),
        }
    }

    /// Log errors with context
    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!("{}: {}", context, error);
    }

    /// Log performance metrics
    pub fn performance_metric(operation: &str, duration_ms: u64, additional_info: Option<&str>) {
        match additional_info {
            Some(info) => info!(
                "perf op={} elapsed_ms={} ({})",
                operation, duration_ms, info
            ),
            None => debug!("perf op={} elapsed_ms={}", operation, duration_ms),
        }
    }
}

/// Helper for timing operations
pub struct TimedOperation {
    start: std::time::Instant,
    operation: String,
}

impl TimedOperation {
    pub fn new(operation: &str) -> Self {
        debug!("Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation: operation.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn finish(self) -> u64 {
        let duration = self.elapsed_ms();
        LogContext::performance_metric(&self.operation, duration, None);
        duration
    }

    pub fn finish_with_info(self, info: &str) -> u64 {
        let duration = self.elapsed_ms();
        LogContext::performance_metric(&self.operation, duration, Some(info));
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tee_writer_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("translation.log");
        let file = open_log_file(&path).unwrap();

        let mut writer = TeeWriter { file: Some(file) };
        writer.write_all(b"tqp.run.start\n").unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "tqp.run.start\n");
    }

    #[test]
    fn test_timed_operation_reports_elapsed() {
        let timer = TimedOperation::new("unit");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.finish() >= 5);
    }
}
