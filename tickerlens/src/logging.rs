//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a directory is configured, to a daily
//! rolling file through a non-blocking writer. `RUST_LOG` overrides the
//! configured level.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default file name prefix for rolled log files.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "tickerlens.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {message}")]
    Filter { directive: String, message: String },

    #[error("failed to create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (`info`,
    /// `tickerlens=debug`, ...).
    pub level: String,
    /// Rolling-file directory; `None` logs to stderr only.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
            ansi: true,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.directory = Some(directory.as_ref().to_path_buf());
        self
    }

    pub fn without_file(mut self) -> Self {
        self.directory = None;
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::Filter {
            directive: self.level.clone(),
            message: e.to_string(),
        })
    }
}

/// Local-time RFC 3339 timestamps, falling back to UTC when the local
/// offset cannot be determined.
fn local_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

/// Installs the global subscriber.
///
/// Returns the file writer's guard when file logging is enabled; keep it
/// alive for the lifetime of the process or buffered lines are lost.
///
/// # Errors
///
/// Fails if the filter directive is invalid, the log directory cannot be
/// created, or a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = config.filter()?;
    let timer = local_timer();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone())
        .with_ansi(config.ansi);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(timer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(version = crate::VERSION, "logging initialized");
    Ok(guard)
}
