//! Spendtrail CLI - Credit card statement extraction and reconciliation
//!
//! Usage:
//!   spendtrail init                               Initialize database
//!   spendtrail parse --file F --issuer KEY        Extract one document, no writes
//!   spendtrail ingest --mailbox mailbox.json      Extract and store a mailbox export
//!   spendtrail verifications                      Show monthly reconciliation

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());
    // Issuer arguments name configured issuers case-insensitively
    let identity = |issuer: &str| commands::issuer_for(&config, issuer).identity;

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path, &config),
        Commands::Parse {
            file,
            issuer,
            password,
            json,
        } => commands::cmd_parse(&config, &file, &issuer, password.as_deref(), json),
        Commands::Ingest { mailbox } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_ingest(&db, &config, &mailbox)
        }
        Commands::Transactions { issuer, limit } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_transactions_list(&db, issuer.map(|i| identity(&i)).as_deref(), limit)
        }
        Commands::Verifications { issuer } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_verifications(&db, issuer.map(|i| identity(&i)).as_deref())
        }
        Commands::Due { days } => {
            let db = commands::open_db(&db_path)?;
            let today = chrono::Local::now().date_naive();
            commands::cmd_due(&db, today, days)
        }
        Commands::Reset {
            issuer,
            month,
            year,
            purge,
        } => {
            let db = commands::open_db(&db_path)?;
            let period = commands::resolve_period(month, year)?;
            commands::cmd_reset(&db, &identity(&issuer), period, purge)
        }
        Commands::Export {
            issuer,
            from,
            to,
            output,
        } => {
            let db = commands::open_db(&db_path)?;
            commands::cmd_export(
                &db,
                issuer.map(|i| identity(&i)).as_deref(),
                from.as_deref(),
                to.as_deref(),
                output.as_deref(),
            )
        }
    }
}
