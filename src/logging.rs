//! Logging setup
//!
//! Logs go to stderr and, unless disabled, to a plain-text log file that is
//! rotated by size when the process starts.

use crate::error::{DigestError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILE: &str = "script_debug.log";

/// Rotate once the log file grows past this size
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Number of rotated files kept (`.1` … `.5`)
pub const LOG_BACKUPS: u32 = 5;

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub verbose: bool,
    /// `None` disables the file output
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the program.
pub fn init(options: &LoggingOptions) -> Result<Option<WorkerGuard>> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter(options.verbose));

    let (file_layer, guard) = match &options.log_file {
        Some(path) => {
            rotate_if_needed(path, MAX_LOG_BYTES, LOG_BACKUPS)?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| DigestError::ConfigError(format!("invalid log file: {}", path.display())))?;
            fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter(options.verbose));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| DigestError::ConfigError(format!("failed to initialize logging: {}", e)))?;

    Ok(guard)
}

/// Shift `path` to `path.1`, `path.1` to `path.2`, … when it exceeds `max_bytes`
///
/// The oldest backup beyond `backups` is deleted.
pub fn rotate_if_needed(path: &Path, max_bytes: u64, backups: u32) -> Result<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size <= max_bytes {
        return Ok(false);
    }

    if backups == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }

    let oldest = backup_path(path, backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..backups).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            fs::rename(&from, backup_path(path, n + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))?;
    Ok(true)
}

fn backup_path(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}
