//! INI configuration file.
//!
//! The file lives at `~/.tickerlens/config.ini`. Every key is optional;
//! missing keys keep their defaults, and a missing file is the same as an
//! empty one.
//!
//! ```ini
//! [cache]
//! directory = ~/.tickerlens/cache
//! memory_ttl_secs = 600
//! durable_ttl_secs = 3600
//! memory_max_entries = 10000
//! series_ttl_secs = 60
//! fundamentals_ttl_secs = 300
//! order_flow_ttl_secs = 60
//!
//! [themes]
//! directory = ~/.tickerlens/themes
//! primary_max_age_hours = 24
//! secondary_max_age_days = 30
//! secondary_pages = 7
//! secondary_request_delay_ms = 200
//! refresh_interval_hours = 24
//!
//! [analysis]
//! max_theme_summary = 3
//!
//! [logging]
//! level = info
//! directory = ~/.tickerlens/logs
//! ```
//!
//! `order_flow_ttl_secs = 0` disables order-flow caching.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::analysis::{AnalysisOptions, DEFAULT_MAX_THEME_SUMMARY};
use crate::cache::{
    ResourceTtls, TwoLevelConfig, DEFAULT_DURABLE_TTL, DEFAULT_MEMORY_MAX_ENTRIES,
    DEFAULT_MEMORY_TTL,
};
use crate::logging::LogConfig;
use crate::themes::{CatalogConfig, SourcePlan};

/// Name of the per-user directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".tickerlens";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading, saving or editing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `~/.tickerlens`, or `./.tickerlens` when no home directory is known.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Expands a leading `~` to the home directory.
fn expand_home(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(raw),
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub memory_ttl_secs: u64,
    pub durable_ttl_secs: u64,
    pub memory_max_entries: u64,
    pub series_ttl_secs: u64,
    pub fundamentals_ttl_secs: u64,
    /// Zero disables order-flow caching.
    pub order_flow_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let resources = ResourceTtls::default();
        Self {
            directory: config_directory().join("cache"),
            memory_ttl_secs: DEFAULT_MEMORY_TTL.as_secs(),
            durable_ttl_secs: DEFAULT_DURABLE_TTL.as_secs(),
            memory_max_entries: DEFAULT_MEMORY_MAX_ENTRIES,
            series_ttl_secs: resources.series.as_secs(),
            fundamentals_ttl_secs: resources.fundamentals.as_secs(),
            order_flow_ttl_secs: resources.order_flow.map(|d| d.as_secs()).unwrap_or(0),
        }
    }
}

impl CacheSettings {
    pub fn two_level_config(&self) -> TwoLevelConfig {
        TwoLevelConfig::new(&self.directory)
            .with_memory_ttl(Duration::from_secs(self.memory_ttl_secs))
            .with_durable_ttl(Duration::from_secs(self.durable_ttl_secs))
            .with_memory_max_entries(self.memory_max_entries)
    }

    pub fn resource_ttls(&self) -> ResourceTtls {
        ResourceTtls {
            series: Duration::from_secs(self.series_ttl_secs),
            fundamentals: Duration::from_secs(self.fundamentals_ttl_secs),
            order_flow: (self.order_flow_ttl_secs > 0)
                .then(|| Duration::from_secs(self.order_flow_ttl_secs)),
        }
    }
}

/// `[themes]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeSettings {
    pub directory: PathBuf,
    pub primary_max_age_hours: u64,
    pub secondary_max_age_days: u64,
    pub secondary_pages: u32,
    pub secondary_request_delay_ms: u64,
    /// Period of the timer-driven primary rebuild. Zero disables the timer.
    pub refresh_interval_hours: u64,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        let primary = SourcePlan::primary();
        let secondary = SourcePlan::secondary();
        Self {
            directory: config_directory().join("themes"),
            primary_max_age_hours: primary.max_age.as_secs() / 3600,
            secondary_max_age_days: secondary.max_age.as_secs() / 86_400,
            secondary_pages: secondary.pages,
            secondary_request_delay_ms: secondary.request_delay.as_millis() as u64,
            refresh_interval_hours: 24,
        }
    }
}

impl ThemeSettings {
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::new(&self.directory)
            .with_primary(
                SourcePlan::primary().with_max_age(Duration::from_secs(
                    self.primary_max_age_hours.saturating_mul(3600),
                )),
            )
            .with_secondary(
                SourcePlan::secondary()
                    .with_pages(self.secondary_pages)
                    .with_request_delay(Duration::from_millis(self.secondary_request_delay_ms))
                    .with_max_age(Duration::from_secs(
                        self.secondary_max_age_days.saturating_mul(86_400),
                    )),
            )
    }

    /// Timer period, or `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_hours > 0)
            .then(|| Duration::from_secs(self.refresh_interval_hours.saturating_mul(3600)))
    }
}

/// `[analysis]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub max_theme_summary: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_theme_summary: DEFAULT_MAX_THEME_SUMMARY,
        }
    }
}

impl AnalysisSettings {
    pub fn options(&self) -> AnalysisOptions {
        AnalysisOptions {
            max_theme_summary: self.max_theme_summary,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: config_directory().join("logs"),
        }
    }
}

impl LoggingSettings {
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(&self.level).with_directory(&self.directory)
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub themes: ThemeSettings,
    pub analysis: AnalysisSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads `~/.tickerlens/config.ini`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Writes to `~/.tickerlens/config.ini`.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Writes every key to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(io_err)
    }
}

/// Addressable configuration keys, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    CacheDirectory,
    CacheMemoryTtlSecs,
    CacheDurableTtlSecs,
    CacheMemoryMaxEntries,
    CacheSeriesTtlSecs,
    CacheFundamentalsTtlSecs,
    CacheOrderFlowTtlSecs,
    ThemesDirectory,
    ThemesPrimaryMaxAgeHours,
    ThemesSecondaryMaxAgeDays,
    ThemesSecondaryPages,
    ThemesSecondaryRequestDelayMs,
    ThemesRefreshIntervalHours,
    AnalysisMaxThemeSummary,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            CacheDirectory,
            CacheMemoryTtlSecs,
            CacheDurableTtlSecs,
            CacheMemoryMaxEntries,
            CacheSeriesTtlSecs,
            CacheFundamentalsTtlSecs,
            CacheOrderFlowTtlSecs,
            ThemesDirectory,
            ThemesPrimaryMaxAgeHours,
            ThemesSecondaryMaxAgeDays,
            ThemesSecondaryPages,
            ThemesSecondaryRequestDelayMs,
            ThemesRefreshIntervalHours,
            AnalysisMaxThemeSummary,
            LoggingLevel,
            LoggingDirectory,
        ]
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            CacheDirectory
            | CacheMemoryTtlSecs
            | CacheDurableTtlSecs
            | CacheMemoryMaxEntries
            | CacheSeriesTtlSecs
            | CacheFundamentalsTtlSecs
            | CacheOrderFlowTtlSecs => "cache",
            ThemesDirectory
            | ThemesPrimaryMaxAgeHours
            | ThemesSecondaryMaxAgeDays
            | ThemesSecondaryPages
            | ThemesSecondaryRequestDelayMs
            | ThemesRefreshIntervalHours => "themes",
            AnalysisMaxThemeSummary => "analysis",
            LoggingLevel | LoggingDirectory => "logging",
        }
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            CacheDirectory | ThemesDirectory | LoggingDirectory => "directory",
            CacheMemoryTtlSecs => "memory_ttl_secs",
            CacheDurableTtlSecs => "durable_ttl_secs",
            CacheMemoryMaxEntries => "memory_max_entries",
            CacheSeriesTtlSecs => "series_ttl_secs",
            CacheFundamentalsTtlSecs => "fundamentals_ttl_secs",
            CacheOrderFlowTtlSecs => "order_flow_ttl_secs",
            ThemesPrimaryMaxAgeHours => "primary_max_age_hours",
            ThemesSecondaryMaxAgeDays => "secondary_max_age_days",
            ThemesSecondaryPages => "secondary_pages",
            ThemesSecondaryRequestDelayMs => "secondary_request_delay_ms",
            ThemesRefreshIntervalHours => "refresh_interval_hours",
            AnalysisMaxThemeSummary => "max_theme_summary",
            LoggingLevel => "level",
        }
    }

    /// `section.key`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value rendered as it would appear in the file.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let (c, t) = (&config.cache, &config.themes);
        match self {
            CacheDirectory => c.directory.display().to_string(),
            CacheMemoryTtlSecs => c.memory_ttl_secs.to_string(),
            CacheDurableTtlSecs => c.durable_ttl_secs.to_string(),
            CacheMemoryMaxEntries => c.memory_max_entries.to_string(),
            CacheSeriesTtlSecs => c.series_ttl_secs.to_string(),
            CacheFundamentalsTtlSecs => c.fundamentals_ttl_secs.to_string(),
            CacheOrderFlowTtlSecs => c.order_flow_ttl_secs.to_string(),
            ThemesDirectory => t.directory.display().to_string(),
            ThemesPrimaryMaxAgeHours => t.primary_max_age_hours.to_string(),
            ThemesSecondaryMaxAgeDays => t.secondary_max_age_days.to_string(),
            ThemesSecondaryPages => t.secondary_pages.to_string(),
            ThemesSecondaryRequestDelayMs => t.secondary_request_delay_ms.to_string(),
            ThemesRefreshIntervalHours => t.refresh_interval_hours.to_string(),
            AnalysisMaxThemeSummary => config.analysis.max_theme_summary.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingDirectory => config.logging.directory.display().to_string(),
        }
    }

    /// Parses and stores `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let (c, t) = (&mut config.cache, &mut config.themes);
        match self {
            CacheDirectory => c.directory = self.parse_path(value)?,
            CacheMemoryTtlSecs => c.memory_ttl_secs = self.parse_num(value)?,
            CacheDurableTtlSecs => c.durable_ttl_secs = self.parse_num(value)?,
            CacheMemoryMaxEntries => c.memory_max_entries = self.parse_num(value)?,
            CacheSeriesTtlSecs => c.series_ttl_secs = self.parse_num(value)?,
            CacheFundamentalsTtlSecs => c.fundamentals_ttl_secs = self.parse_num(value)?,
            CacheOrderFlowTtlSecs => c.order_flow_ttl_secs = self.parse_num(value)?,
            ThemesDirectory => t.directory = self.parse_path(value)?,
            ThemesPrimaryMaxAgeHours => t.primary_max_age_hours = self.parse_num(value)?,
            ThemesSecondaryMaxAgeDays => t.secondary_max_age_days = self.parse_num(value)?,
            ThemesSecondaryPages => match self.parse_num::<u32>(value)? {
                0 => return Err(self.invalid(value)),
                pages => t.secondary_pages = pages,
            },
            ThemesSecondaryRequestDelayMs => {
                t.secondary_request_delay_ms = self.parse_num(value)?
            }
            ThemesRefreshIntervalHours => t.refresh_interval_hours = self.parse_num(value)?,
            AnalysisMaxThemeSummary => config.analysis.max_theme_summary = self.parse_num(value)?,
            LoggingLevel => {
                let level = value.trim();
                if level.is_empty() {
                    return Err(self.invalid(value));
                }
                config.logging.level = level.to_string();
            }
            LoggingDirectory => config.logging.directory = self.parse_path(value)?,
        }
        Ok(())
    }

    fn parse_num<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value.trim().parse().map_err(|_| self.invalid(value))
    }

    fn parse_path(&self, value: &str) -> Result<PathBuf, ConfigError> {
        if value.trim().is_empty() {
            return Err(self.invalid(value));
        }
        Ok(expand_home(value))
    }

    fn invalid(&self, value: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
