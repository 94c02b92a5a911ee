pub mod logger;

pub use logger::{init_logger, LogContext, LoggerSettings, TimedOperation};
