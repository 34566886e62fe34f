//! CLI argument definitions using clap
//!
//! The command implementations live in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Spendtrail - Card statements in, reconciled ledger out
#[derive(Parser)]
#[command(name = "spendtrail")]
#[command(about = "Credit card statement extraction and reconciliation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides `database.path` from the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to <data dir>/spendtrail/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Extract one statement file and print the result without storing it
    Parse {
        /// Statement PDF, or a plain text file holding an email body
        #[arg(short, long)]
        file: PathBuf,

        /// Issuer identity or strategy key (e.g. hdfc, sbi, amex)
        #[arg(short, long)]
        issuer: String,

        /// PDF password (overrides the configured key)
        #[arg(long)]
        password: Option<String>,

        /// Print the full extraction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract and store every message of a mailbox export
    Ingest {
        /// JSON array of messages; attachment paths are relative to this file
        #[arg(short, long)]
        mailbox: PathBuf,
    },

    /// List stored transactions, newest first
    Transactions {
        #[arg(short, long)]
        issuer: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show reported vs computed totals per statement month
    Verifications {
        #[arg(short, long)]
        issuer: Option<String>,
    },

    /// Show statements with a payment due soon
    Due {
        /// Look-ahead window in days
        #[arg(short, long, default_value = "10")]
        days: i64,
    },

    /// Forget processed messages so the next ingest re-reads them
    Reset {
        #[arg(short, long)]
        issuer: String,

        /// Limit to messages dated in this month (requires --year)
        #[arg(long, requires = "year")]
        month: Option<u32>,

        #[arg(long, requires = "month")]
        year: Option<i32>,

        /// Also delete stored transactions, summaries and verifications
        #[arg(long)]
        purge: bool,
    },

    /// Export transactions to CSV
    Export {
        #[arg(short, long)]
        issuer: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
