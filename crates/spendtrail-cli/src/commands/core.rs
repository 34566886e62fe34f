//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_config` - Resolve the config file
//! - `open_db` - Shared utility to open the database
//! - `resolve_period` - Turn `--month/--year` into a statement period
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use spendtrail_core::{AppConfig, Database, StatementPeriod};

pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(explicit).context("Failed to load config")
}

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::new(path_str).context("Failed to open database")
}

/// Both or neither of `--month`/`--year`
pub fn resolve_period(month: Option<u32>, year: Option<i32>) -> Result<Option<StatementPeriod>> {
    match (month, year) {
        (Some(month), Some(year)) => StatementPeriod::new(month, year)
            .map(Some)
            .with_context(|| format!("Invalid statement month: {}/{}", month, year)),
        (None, None) => Ok(None),
        _ => anyhow::bail!("--month and --year must be given together"),
    }
}

pub fn cmd_init(db_path: &Path, config: &AppConfig) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    let registry = config
        .build_registry()
        .context("Failed to build strategy registry")?;
    println!("   Strategies: {}", registry.keys().collect::<Vec<_>>().join(", "));
    println!("   Configured issuers: {}", config.issuers.len());

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Try one statement: spendtrail parse --file statement.pdf --issuer hdfc");
    println!("  2. Ingest a mailbox export: spendtrail ingest --mailbox mailbox.json");

    Ok(())
}
