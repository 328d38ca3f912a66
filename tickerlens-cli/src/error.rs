//! CLI error type.

use thiserror::Error;
use tickerlens::cache::{CacheError, UnknownResourceType};
use tickerlens::config::ConfigError;
use tickerlens::logging::LoggingError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Resource(#[from] UnknownResourceType),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}
