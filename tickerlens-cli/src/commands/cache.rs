//! Durable cache CLI commands.

use std::path::Path;
use std::time::Duration;

use clap::Subcommand;
use console::style;
use tickerlens::cache::{CacheKey, DurableCache, DurableRead, ResourceType};
use tickerlens::clock::{elapsed_since, Clock, SystemClock};
use tickerlens::config::{config_file_path, ConfigFile};

use super::format_age;
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Print one cached document and its age
    Show {
        /// Subject id (e.g. 005930)
        subject: String,
        /// Resource type: news or outlook
        resource: String,
    },
    /// List cached documents
    List,
    /// Delete every cached document
    Clear,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction) -> Result<(), CliError> {
    run_from(action, &config_file_path())
}

/// A config file that fails to load is an error here: `clear` must never
/// fall back to the default directory.
fn run_from(action: CacheAction, config_path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;
    let durable = DurableCache::new(
        &config.cache.directory,
        Duration::from_secs(config.cache.durable_ttl_secs),
    );
    run_with(action, &durable)
}

fn run_with(action: CacheAction, durable: &DurableCache) -> Result<(), CliError> {
    let now = SystemClock.now();

    match action {
        CacheAction::Show { subject, resource } => {
            let resource: ResourceType = resource.parse()?;
            let key = CacheKey::new(&subject, resource);
            match durable.read(&key, now)? {
                DurableRead::Missing => println!("{}: not cached", key),
                DurableRead::Expired { age } => println!(
                    "{}: {} ({} old, ttl {})",
                    key,
                    style("expired").yellow(),
                    format_age(age),
                    format_age(durable.ttl())
                ),
                DurableRead::Fresh(entry) => {
                    println!(
                        "{}: {} ({} old, ttl {})",
                        key,
                        style("fresh").green(),
                        format_age(entry.age(now)),
                        format_age(entry.ttl())
                    );
                    println!("{}", serde_json::to_string_pretty(entry.payload())?);
                }
            }
        }
        CacheAction::List => {
            let files = durable.list()?;
            println!("Durable cache: {}", durable.directory().display());
            for file in &files {
                let age = elapsed_since(file.modified, now);
                let marker = if age > durable.ttl() {
                    style("expired").yellow()
                } else {
                    style("fresh").green()
                };
                let name = file
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!(
                    "  {:<40} {:>8} B  {:>8}  {}",
                    name,
                    file.size_bytes,
                    format_age(age),
                    marker
                );
            }
            println!("{} documents", files.len());
        }
        CacheAction::Clear => {
            println!("Clearing durable cache at: {}", durable.directory().display());
            let removed = durable.clear()?;
            println!("Deleted {} files", removed);
        }
    }
    Ok(())
}
