/// Command-line options for the cron runner.
///
/// Flags accept `--name=value` or `--name value`. Integer options fall back to an
/// upper-cased environment variable (`MAX_SECS`, `BATCH_SIZE`), then to the first two
/// positional arguments, then to their defaults. Non-positive values are ignored.
use super::app_config::parse_bool;
use crate::shared::errors::{AppError, AppResult};

pub const DEFAULT_MAX_SECS: u64 = 55;
pub const DEFAULT_BATCH_SIZE: usize = 120;

pub const USAGE: &str = "\
Usage: translation-cron [--max-secs=N] [--batch-size=N] [--dry-run] [--fake]
                        [--lang=CODE] [--client=CODE] [--type=TYPE]
                        [--subject=SUBJECT] [--variant=VARIANT]

  --max-secs     wall-clock budget for the run in seconds (default 55, env MAX_SECS)
  --batch-size   jobs claimed per cycle (default 120, env BATCH_SIZE)
  --dry-run      inspect eligible jobs without translating or writing (env DRY_RUN)
  --fake         use the null translator in prefix mode instead of the configured provider
  --lang ...     only process jobs matching these scope values
";

/// Raw scope values from the command line; empty values are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeArgs {
    pub target_language: Option<String>,
    pub client_code: Option<String>,
    pub resource_type: Option<String>,
    pub subject: Option<String>,
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub max_secs: u64,
    pub batch_size: usize,
    pub dry_run: bool,
    pub fake: bool,
    pub scope: ScopeArgs,
    pub show_help: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            max_secs: DEFAULT_MAX_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            fake: false,
            scope: ScopeArgs::default(),
            show_help: false,
        }
    }
}

impl CliOptions {
    /// Parse `std::env::args()` (program name already skipped) with the process
    /// environment as fallback.
    pub fn from_args() -> AppResult<Self> {
        Self::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    pub fn parse<I, F>(args: I, env: F) -> AppResult<Self>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut max_secs: Option<String> = None;
        let mut batch_size: Option<String> = None;
        let mut dry_run: Option<bool> = None;
        let mut options = CliOptions::default();
        let mut positional: Vec<String> = Vec::new();

        let mut args = args.into_iter().peekable();
        while let Some(arg) = args.next() {
            if arg == "-h" || arg == "--help" {
                options.show_help = true;
                continue;
            }

            let Some(flag) = arg.strip_prefix("--") else {
                positional.push(arg);
                continue;
            };

            let (name, inline_value) = match flag.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (flag.to_string(), None),
            };

            match name.as_str() {
                "dry-run" => {
                    dry_run = Some(match inline_value {
                        Some(v) if !v.is_empty() => parse_bool(&v).unwrap_or(false),
                        _ => true,
                    });
                }
                "fake" => options.fake = true,
                _ => {
                    let value = match inline_value {
                        Some(v) => v,
                        None => {
                            let has_value =
                                matches!(args.peek(), Some(next) if !next.starts_with("--"));
                            match args.next() {
                                Some(next) if has_value => next,
                                _ => {
                                    return Err(AppError::InvalidInput(format!(
                                        "Missing value for --{}",
                                        name
                                    )))
                                }
                            }
                        }
                    };

                    match name.as_str() {
                        "max-secs" | "seconds" => max_secs = Some(value),
                        "batch-size" | "batch" => batch_size = Some(value),
                        "lang" => options.scope.target_language = non_empty(value),
                        "client" => options.scope.client_code = non_empty(value),
                        "type" => options.scope.resource_type = non_empty(value),
                        "subject" => options.scope.subject = non_empty(value),
                        "variant" => options.scope.variant = non_empty(value),
                        other => {
                            return Err(AppError::InvalidInput(format!(
                                "Unknown option --{}",
                                other
                            )))
                        }
                    }
                }
            }
        }

        let max_secs = max_secs
            .or_else(|| env("MAX_SECS"))
            .or_else(|| positional.first().cloned());
        options.max_secs = positive_int(max_secs.as_deref()).unwrap_or(DEFAULT_MAX_SECS);

        let batch_size = batch_size
            .or_else(|| env("BATCH_SIZE"))
            .or_else(|| positional.get(1).cloned());
        options.batch_size = positive_int(batch_size.as_deref())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_BATCH_SIZE);

        options.dry_run = dry_run
            .or_else(|| env("DRY_RUN").and_then(|v| parse_bool(&v)))
            .unwrap_or(false);

        Ok(options)
    }
}

fn positive_int(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as u64)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
