//! Theme catalog CLI commands.
//!
//! Reads the snapshots on disk only. The catalog is opened with sources
//! that always fail, so nothing here can trigger a crawl.

use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use console::style;
use tickerlens::clock::{elapsed_since, Clock, SystemClock};
use tickerlens::config::ConfigFile;
use tickerlens::gateway::{BoxFuture, UpstreamError};
use tickerlens::themes::{
    CatalogConfig, CatalogSource, Constituent, SourceTag, ThemeCatalogCache, ThemeHeader,
};

use super::format_age;
use crate::error::CliError;

/// Themes subcommands.
#[derive(Debug, Subcommand)]
pub enum ThemesAction {
    /// Show snapshot state for both sources
    Info,
    /// Find themes containing a stock (name or code)
    Find {
        /// Stock name or code
        query: String,
    },
    /// Search primary themes by name (blank lists all)
    Search {
        /// Theme name keyword
        #[arg(default_value = "")]
        keyword: String,
    },
}

/// Catalog source used when no upstream is available.
struct OfflineSource(SourceTag);

impl CatalogSource for OfflineSource {
    fn tag(&self) -> SourceTag {
        self.0
    }

    fn list_themes(&self, _page: u32) -> BoxFuture<'_, Result<Vec<ThemeHeader>, UpstreamError>> {
        Box::pin(async { Err(UpstreamError::unavailable("offline")) })
    }

    fn fetch_constituents<'a>(
        &'a self,
        _header: &'a ThemeHeader,
    ) -> BoxFuture<'a, Result<Vec<Constituent>, UpstreamError>> {
        Box::pin(async { Err(UpstreamError::unavailable("offline")) })
    }
}

fn open_catalog(config: CatalogConfig) -> ThemeCatalogCache {
    ThemeCatalogCache::new(
        config,
        Arc::new(OfflineSource(SourceTag::Primary)),
        Arc::new(OfflineSource(SourceTag::Secondary)),
        Arc::new(SystemClock),
    )
}

/// Run a themes subcommand.
pub fn run(action: ThemesAction) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    run_in(action, config.themes.catalog_config())
}

fn run_in(action: ThemesAction, config: CatalogConfig) -> Result<(), CliError> {
    let directory = config.directory.clone();
    let catalog = open_catalog(config);

    match action {
        ThemesAction::Info => print_info(&catalog, &directory),
        ThemesAction::Find { query } => {
            let matches = catalog.find_cached(&query);
            if matches.is_empty() {
                println!("No themes contain '{}'", query);
            }
            for m in matches {
                println!(
                    "{:<10} {:<40} {:>8.2}%  {} ({})",
                    m.source.as_str(),
                    m.theme_name,
                    m.fluctuation_pct,
                    m.stock_name,
                    m.stock_code
                );
            }
        }
        ThemesAction::Search { keyword } => {
            let themes = catalog.search_cached(&keyword);
            if themes.is_empty() {
                println!("No primary themes match '{}'", keyword);
            }
            for theme in themes {
                println!(
                    "{:<40} {:>8.2}%  {} stocks",
                    theme.name,
                    theme.fluctuation_pct,
                    theme.constituents.len()
                );
            }
        }
    }
    Ok(())
}

fn print_info(catalog: &ThemeCatalogCache, directory: &Path) {
    let now = SystemClock.now();
    println!("Theme snapshots: {}", directory.display());
    for tag in SourceTag::ALL {
        let info = catalog.info(tag);
        let max_age = catalog.config().plan(tag).max_age;
        let state = if !info.exists {
            style("missing").red()
        } else if info.valid {
            style("valid").green()
        } else {
            style("stale").yellow()
        };
        println!();
        println!("[{}] {}", tag, state);
        if let Some(updated_at) = info.updated_at {
            println!(
                "  Updated: {} ({} ago)",
                updated_at.to_rfc3339(),
                format_age(elapsed_since(updated_at, now))
            );
        }
        println!("  Themes:  {}", info.count);
        println!("  Max age: {}", format_age(max_age));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commands_on_empty_directory() {
        let temp = TempDir::new().unwrap();
        let config = CatalogConfig::new(temp.path());

        run_in(ThemesAction::Info, config.clone()).unwrap();
        run_in(
            ThemesAction::Find {
                query: "005930".to_string(),
            },
            config.clone(),
        )
        .unwrap();
        run_in(
            ThemesAction::Search {
                keyword: String::new(),
            },
            config,
        )
        .unwrap();

        // Nothing was crawled or written.
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
