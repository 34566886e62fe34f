//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{StatementPeriod, StoredTransaction, TransactionCandidate};
use crate::normalize::round2;

/// Deduplication hash over (issuer, date, amount, description)
pub fn import_hash(issuer: &str, date: NaiveDate, amount: f64, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(issuer.as_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(round2(amount).to_be_bytes());
    hasher.update(description.as_bytes());
    hex::encode(hasher.finalize())
}

/// Insert one candidate unless an identical row exists.
///
/// Returns the new row id, or `None` for a duplicate.
pub(crate) fn insert_candidate(
    conn: &Connection,
    issuer: &str,
    candidate: &TransactionCandidate,
    period: Option<StatementPeriod>,
    source_message_id: &str,
) -> Result<Option<i64>> {
    let amount = round2(candidate.amount);
    let changed = conn.execute(
        r#"
        INSERT OR IGNORE INTO transactions
            (issuer, transaction_date, description, merchant, amount, points, classification,
             statement_month, statement_year, source_message_id, import_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            issuer,
            candidate.transaction_date.to_string(),
            candidate.description,
            candidate.merchant,
            amount,
            candidate.points,
            candidate.classification,
            period.map(|p| p.month),
            period.map(|p| p.year),
            source_message_id,
            import_hash(issuer, candidate.transaction_date, amount, &candidate.description),
        ],
    )?;

    Ok((changed > 0).then(|| conn.last_insert_rowid()))
}

/// Sum of stored amounts dated inside the period's calendar month
pub(crate) fn sum_period(conn: &Connection, issuer: &str, period: StatementPeriod) -> Result<f64> {
    let (first, last) = period.bounds();
    let total: f64 = conn.query_row(
        r#"
        SELECT COALESCE(SUM(amount), 0) FROM transactions
        WHERE issuer = ? AND transaction_date BETWEEN ? AND ?
        "#,
        params![issuer, first.to_string(), last.to_string()],
        |row| row.get(0),
    )?;
    Ok(round2(total))
}

/// Stored rows dated inside the period's calendar month
pub(crate) fn count_period(conn: &Connection, issuer: &str, period: StatementPeriod) -> Result<i64> {
    let (first, last) = period.bounds();
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE issuer = ? AND transaction_date BETWEEN ? AND ?",
        params![issuer, first.to_string(), last.to_string()],
        |row| row.get(0),
    )?)
}

pub(crate) fn set_category(conn: &Connection, id: i64, category: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE transactions SET category = ? WHERE id = ?",
        params![category, id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("transaction {}", id)));
    }
    Ok(())
}

/// Delete the rows dated inside one period's calendar month
pub(super) fn delete_period(conn: &Connection, issuer: &str, period: StatementPeriod) -> Result<usize> {
    let (first, last) = period.bounds();
    Ok(conn.execute(
        "DELETE FROM transactions WHERE issuer = ? AND transaction_date BETWEEN ? AND ?",
        params![issuer, first.to_string(), last.to_string()],
    )?)
}

pub(crate) const SELECT_COLUMNS: &str = r#"
    SELECT id, issuer, transaction_date, description, merchant, amount, points,
           classification, category, statement_month, statement_year, import_hash, created_at
    FROM transactions
"#;

pub(crate) fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<StoredTransaction> {
    let date: String = row.get(2)?;
    let month: Option<u32> = row.get(9)?;
    let year: Option<i32> = row.get(10)?;
    let created_at: String = row.get(12)?;

    Ok(StoredTransaction {
        id: row.get(0)?,
        issuer: row.get(1)?,
        transaction_date: parse_date(&date)?,
        description: row.get(3)?,
        merchant: row.get(4)?,
        amount: row.get(5)?,
        points: row.get(6)?,
        classification: row.get(7)?,
        category: row.get(8)?,
        statement_period: month.zip(year).and_then(|(m, y)| StatementPeriod::new(m, y)),
        import_hash: row.get(11)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Insert one candidate outside an ingest (duplicates return `None`)
    pub fn insert_transaction(
        &self,
        issuer: &str,
        candidate: &TransactionCandidate,
        period: Option<StatementPeriod>,
        source_message_id: &str,
    ) -> Result<Option<i64>> {
        let conn = self.conn()?;
        insert_candidate(&conn, issuer, candidate, period, source_message_id)
    }

    /// Newest first, optionally for one issuer
    pub fn list_transactions(&self, issuer: Option<&str>, limit: i64) -> Result<Vec<StoredTransaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "{} WHERE (?1 IS NULL OR issuer = ?1) ORDER BY transaction_date DESC, id DESC LIMIT ?2",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![issuer, limit], row_to_transaction)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Rows dated inside one period, oldest first
    pub fn list_period_transactions(
        &self,
        issuer: &str,
        period: StatementPeriod,
    ) -> Result<Vec<StoredTransaction>> {
        let conn = self.conn()?;
        let (first, last) = period.bounds();
        let sql = format!(
            "{} WHERE issuer = ? AND transaction_date BETWEEN ? AND ? ORDER BY transaction_date, id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![issuer, first.to_string(), last.to_string()],
                row_to_transaction,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<StoredTransaction>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], row_to_transaction)
            .optional()?)
    }

    pub fn count_transactions(&self, issuer: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE (?1 IS NULL OR issuer = ?1)",
            params![issuer],
            |row| row.get(0),
        )?)
    }

    /// Sum of stored amounts in one period's calendar month
    pub fn computed_total(&self, issuer: &str, period: StatementPeriod) -> Result<f64> {
        let conn = self.conn()?;
        sum_period(&conn, issuer, period)
    }

    /// Set a transaction's category
    pub fn set_transaction_category(&self, id: i64, category: &str) -> Result<()> {
        let conn = self.conn()?;
        set_category(&conn, id, category)
    }

    /// Delete one period's transactions for an issuer
    pub fn delete_period_transactions(&self, issuer: &str, period: StatementPeriod) -> Result<usize> {
        let conn = self.conn()?;
        delete_period(&conn, issuer, period)
    }
}
