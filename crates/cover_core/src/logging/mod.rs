//! Logging infrastructure.
//!
//! - Global `tracing` subscriber (stderr, optional daily rolling file)
//! - Per-session loggers with a view callback and a tail buffer
//!
//! # Example
//!
//! ```no_run
//! use cover_core::logging::{init_tracing, LogLevel, SessionLogConfig, SessionLogger};
//!
//! init_tracing(LogLevel::Info);
//!
//! let logger = SessionLogger::new("separate", SessionLogConfig::default(), None);
//! logger.phase("Upload");
//! logger.success("Upload accepted");
//! ```

mod session_logger;
mod types;

pub use session_logger::SessionLogger;
pub use types::{LogLevel, MessagePrefix, SessionLogConfig, ViewLogCallback};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name prefix inside the logs folder.
pub const LOG_FILE_PREFIX: &str = "cover-studio.log";

/// Initialize the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(env_filter(default_level))
        .init();
}

/// Like `init_tracing`, plus a daily rolling file in `log_dir`.
///
/// Keep the returned guard alive; dropping it flushes and stops the file
/// writer.
pub fn init_tracing_with_file(default_level: LogLevel, log_dir: &Path) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(env_filter(default_level))
        .init();

    guard
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_filter()))
}
