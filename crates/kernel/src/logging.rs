//! Process-wide logging.
//!
//! [`init`] installs the tracing subscriber once at startup and returns a
//! [`LoggingGuard`]. Dropping the guard flushes and closes the log file, so
//! `main` keeps it alive until shutdown.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,tower_http=debug,sqlx=warn";
const LOG_EXTENSION: &str = "log";

/// Where log output goes.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory for per-run log files.
    pub dir: PathBuf,
    /// Write a log file in addition to stdout.
    pub to_file: bool,
}

/// Keeps the file writer alive. Dropping it flushes buffered lines.
#[must_use = "dropping the guard closes the log file"]
pub struct LoggingGuard {
    file: Option<PathBuf>,
    worker: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Path of this run's log file, if file logging is on.
    pub fn log_file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Flush and close the log file.
    pub fn shutdown(self) {
        info!("logging shut down");
        drop(self.worker);
    }
}

/// File name for a run that started at `started`: `YYYY.MM.DD-HH.MM.SS.log`.
pub fn session_file_name(started: DateTime<Local>) -> String {
    format!("{}.{LOG_EXTENSION}", started.format("%Y.%m.%d-%H.%M.%S"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(settings: &LogSettings) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, worker, file) = if settings.to_file {
        std::fs::create_dir_all(&settings.dir).with_context(|| {
            format!("failed to create log directory {}", settings.dir.display())
        })?;
        let name = session_file_name(Local::now());
        let appender = tracing_appender::rolling::never(&settings.dir, &name);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_ansi(false).with_writer(writer);
        (Some(layer), Some(worker), Some(settings.dir.join(name)))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some(path) = &file {
        info!(path = %path.display(), "writing log file");
    }

    Ok(LoggingGuard { file, worker })
}

/// Delete every `.log` file in `dir` except `keep`. Returns how many were removed.
pub fn clear_logs(dir: &Path, keep: Option<&Path>) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read log directory {}", dir.display()));
        }
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry.context("failed to read log directory entry")?.path();
        let is_log = path.is_file() && path.extension().is_some_and(|ext| ext == LOG_EXTENSION);
        if !is_log || keep.is_some_and(|k| k == path.as_path()) {
            continue;
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
        removed += 1;
    }
    Ok(removed)
}
