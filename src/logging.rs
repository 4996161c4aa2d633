//! Log setup.
//!
//! The terminal belongs to the UI, so logs go to a daily-rolling file under the data
//! directory (`$XDG_DATA_HOME/devdecks/logs`). Filtering follows `RUST_LOG`, defaulting
//! to `devdecks=info`.

use color_eyre::{eyre::eyre, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "devdecks.log";
const DEFAULT_FILTER: &str = "devdecks=info";

/// Keeps the background log writer alive. Dropping it flushes the file.
pub struct LoggingGuard {
  _file_guard: WorkerGuard,
}

/// Directory log files are written to.
pub fn default_log_dir() -> PathBuf {
  dirs::data_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join("devdecks")
    .join("logs")
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber, writing to `log_dir`.
pub fn init_logging(log_dir: &Path) -> Result<LoggingGuard> {
  fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
  let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_writer(non_blocking_file)
    .with_ansi(false)
    .with_target(true);

  tracing_subscriber::registry()
    .with(env_filter())
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(LoggingGuard {
    _file_guard: file_guard,
  })
}
