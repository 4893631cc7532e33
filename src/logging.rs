use std::fs;
use std::path::Path;

use anyhow::Context;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

pub const LOG_FILE_NAME: &str = "tasklist.log";
const MAX_LOG_BYTES: usize = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

fn filter_for(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives)
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER))
}

/// JSON lines on stderr, filtered by `TASKLIST_LOG`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_stderr(directives: &str) {
    let _ = tracing_log::LogTracer::init();
    let _ = fmt()
        .with_env_filter(filter_for(directives))
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(unix)]
fn rotating_file(path: &Path) -> FileRotate<AppendCount> {
    FileRotate::new(
        path,
        AppendCount::new(MAX_LOG_FILES),
        ContentLimit::Bytes(MAX_LOG_BYTES),
        Compression::None,
        None,
    )
}

#[cfg(not(unix))]
fn rotating_file(path: &Path) -> FileRotate<AppendCount> {
    FileRotate::new(
        path,
        AppendCount::new(MAX_LOG_FILES),
        ContentLimit::Bytes(MAX_LOG_BYTES),
        Compression::None,
    )
}

/// Stderr plus a size-rotated `logs/tasklist.log` under the data directory.
///
/// Keep the returned guard alive for as long as events should reach the file.
pub fn init(config: &AppConfig) -> anyhow::Result<WorkerGuard> {
    let logs_dir = config.logs_dir();
    fs::create_dir_all(&logs_dir)
        .with_context(|| format!("create log directory {}", logs_dir.display()))?;

    let file = rotating_file(&logs_dir.join(LOG_FILE_NAME));
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let stderr_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr);
    let file_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(false)
        .with_writer(file_writer);

    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::registry()
        .with(filter_for(&config.log_filter))
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(guard)
}
