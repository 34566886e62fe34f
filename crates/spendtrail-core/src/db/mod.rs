//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - Deduplicated transaction storage and period sums
//! - `statements` - Statement summaries and monthly verifications
//! - `processed` - Processed-email markers

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Error, Result};

mod processed;
mod statements;
mod transactions;

pub(crate) use processed::insert_marker;
pub(crate) use statements::{
    get_verification, set_summary_count, summary_total, upsert_summary, upsert_verification,
};
pub(crate) use transactions::{
    count_period, insert_candidate, row_to_transaction, sum_period, SELECT_COLUMNS,
};
pub use transactions::import_hash;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Format a DateTime<Utc> the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Dates are stored as ISO `YYYY-MM-DD` text
pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(4).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;
        debug!("Opened database at {}", path);

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "spendtrail_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        let path = path
            .to_str()
            .ok_or_else(|| Error::InvalidData("temp path is not UTF-8".to_string()))?
            .to_string();
        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside one SQLite transaction; commits only if `f` succeeds
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Remove every stored row for one issuer, optionally limited to one
    /// statement period. Processed markers are kept.
    pub fn purge_issuer(
        &self,
        issuer: &str,
        period: Option<crate::models::StatementPeriod>,
    ) -> Result<PurgeCounts> {
        self.with_transaction(|tx| {
            let counts = match period {
                Some(period) => PurgeCounts {
                    transactions: transactions::delete_period(tx, issuer, period)?,
                    summaries: statements::delete_period(tx, issuer, Some(period))?,
                },
                None => PurgeCounts {
                    transactions: tx
                        .execute("DELETE FROM transactions WHERE issuer = ?", [issuer])?,
                    summaries: statements::delete_period(tx, issuer, None)?,
                },
            };
            Ok(counts)
        })
        .inspect(|counts| {
            info!(
                "Purged {} transactions and {} summaries for {}",
                counts.transactions, counts.summaries, issuer
            )
        })
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        migrate(&conn)
    }
}

/// Rows removed by [`Database::purge_issuer`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub transactions: usize,
    /// Statement summaries plus verifications
    pub summaries: usize,
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- WAL mode: readers don't block the single writer
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;

        -- Transactions; one row per (issuer, date, amount, description)
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY,
            issuer TEXT NOT NULL,
            transaction_date DATE NOT NULL,
            description TEXT NOT NULL,
            merchant TEXT NOT NULL,
            amount REAL NOT NULL,
            points REAL,
            classification TEXT,
            category TEXT,
            statement_month INTEGER,
            statement_year INTEGER,
            source_message_id TEXT,
            import_hash TEXT NOT NULL UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(issuer, transaction_date, amount, description)
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_issuer_date ON transactions(issuer, transaction_date);
        CREATE INDEX IF NOT EXISTS idx_transactions_period ON transactions(issuer, statement_year, statement_month);

        -- Statement summaries, first reported values per period
        CREATE TABLE IF NOT EXISTS statement_summaries (
            id INTEGER PRIMARY KEY,
            issuer TEXT NOT NULL,
            month INTEGER NOT NULL,
            year INTEGER NOT NULL,
            total_amount_due REAL,
            minimum_amount_due REAL,
            due_date DATE,
            transaction_count INTEGER NOT NULL DEFAULT 0,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(issuer, month, year)
        );

        CREATE INDEX IF NOT EXISTS idx_statement_summaries_due ON statement_summaries(due_date);

        -- Reported vs computed totals
        CREATE TABLE IF NOT EXISTS monthly_verifications (
            id INTEGER PRIMARY KEY,
            issuer TEXT NOT NULL,
            month INTEGER NOT NULL,
            year INTEGER NOT NULL,
            reported_total REAL NOT NULL,
            computed_total REAL NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT 0,
            diff REAL NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(issuer, month, year)
        );

        -- Messages already handled, per issuer
        CREATE TABLE IF NOT EXISTS processed_emails (
            id INTEGER PRIMARY KEY,
            message_id TEXT NOT NULL,
            issuer TEXT NOT NULL,
            subject TEXT,
            message_date DATE,
            processed_at DATETIME NOT NULL,
            UNIQUE(message_id, issuer)
        );

        CREATE INDEX IF NOT EXISTS idx_processed_emails_issuer ON processed_emails(issuer, message_date);
        "#,
    )?;

    Ok(())
}
