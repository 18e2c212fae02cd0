//! Tracing setup: terse console output plus an optional debug log file.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::domain::{AppError, Result};

/// Debug log written inside the output directory.
pub const DEBUG_LOG_FILE: &str = "export_debug.log";

/// Console level for a `-v` count.
#[must_use]
pub const fn console_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber.
///
/// With `log_dir`, a second layer appends debug-level records to
/// [`DEBUG_LOG_FILE`] in that directory. The returned guard flushes the
/// file writer on drop and must be held until the process is done logging.
///
/// # Errors
/// Returns error if the log directory cannot be created.
pub fn init_logging(verbosity: u8, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level(verbosity)));
    let console = fmt::layer()
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let Some(dir) = log_dir else {
        // A subscriber may already be installed (tests); keep it.
        let _ = tracing_subscriber::registry().with(console).try_init();
        return Ok(None);
    };

    fs::create_dir_all(dir).map_err(|e| {
        AppError::io(format!("Failed to create log directory {}", dir.display()), e)
    })?;

    let appender = tracing_appender::rolling::never(dir, DEBUG_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();

    Ok(Some(guard))
}
