//! Statement summaries and monthly verifications

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{MonthlyVerification, StatementPeriod, StatementSummary, StoredStatementSummary};

/// Store a period's summary.
///
/// Reported values already stored are kept; only missing ones are filled.
/// The transaction count always moves to the latest value, which callers
/// take from the stored rows for the period.
pub(crate) fn upsert_summary(
    conn: &Connection,
    issuer: &str,
    period: StatementPeriod,
    summary: &StatementSummary,
    transaction_count: i64,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO statement_summaries
            (issuer, month, year, total_amount_due, minimum_amount_due, due_date, transaction_count)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(issuer, month, year) DO UPDATE SET
            total_amount_due = COALESCE(statement_summaries.total_amount_due, excluded.total_amount_due),
            minimum_amount_due = COALESCE(statement_summaries.minimum_amount_due, excluded.minimum_amount_due),
            due_date = COALESCE(statement_summaries.due_date, excluded.due_date),
            transaction_count = excluded.transaction_count,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![
            issuer,
            period.month,
            period.year,
            summary.total_amount_due,
            summary.minimum_amount_due,
            summary.payment_due_date.map(|d| d.to_string()),
            transaction_count,
        ],
    )?;
    Ok(())
}

/// Refresh the stored row count of an existing summary
pub(crate) fn set_summary_count(
    conn: &Connection,
    issuer: &str,
    period: StatementPeriod,
    transaction_count: i64,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE statement_summaries SET transaction_count = ?, updated_at = CURRENT_TIMESTAMP
        WHERE issuer = ? AND month = ? AND year = ?
        "#,
        params![transaction_count, issuer, period.month, period.year],
    )?;
    Ok(())
}

/// Reported total kept for a period, if any document carried one
pub(crate) fn summary_total(
    conn: &Connection,
    issuer: &str,
    period: StatementPeriod,
) -> Result<Option<f64>> {
    Ok(conn
        .query_row(
            "SELECT total_amount_due FROM statement_summaries WHERE issuer = ? AND month = ? AND year = ?",
            params![issuer, period.month, period.year],
            |row| row.get::<_, Option<f64>>(0),
        )
        .optional()?
        .flatten())
}

pub(crate) fn upsert_verification(conn: &Connection, v: &MonthlyVerification) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO monthly_verifications
            (issuer, month, year, reported_total, computed_total, verified, diff)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(issuer, month, year) DO UPDATE SET
            reported_total = excluded.reported_total,
            computed_total = excluded.computed_total,
            verified = excluded.verified,
            diff = excluded.diff,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![
            v.issuer,
            v.period.month,
            v.period.year,
            v.reported_total,
            v.computed_total,
            v.verified,
            v.diff,
        ],
    )?;
    Ok(())
}

pub(crate) fn get_verification(
    conn: &Connection,
    issuer: &str,
    period: StatementPeriod,
) -> Result<Option<MonthlyVerification>> {
    Ok(conn
        .query_row(
            r#"
            SELECT issuer, month, year, reported_total, computed_total, verified, diff
            FROM monthly_verifications WHERE issuer = ? AND month = ? AND year = ?
            "#,
            params![issuer, period.month, period.year],
            row_to_verification,
        )
        .optional()?
        .flatten())
}

/// Summaries and verifications for an issuer, all periods or one
pub(super) fn delete_period(
    conn: &Connection,
    issuer: &str,
    period: Option<StatementPeriod>,
) -> Result<usize> {
    let (month, year) = (period.map(|p| p.month), period.map(|p| p.year));
    let mut removed = 0;
    for table in ["statement_summaries", "monthly_verifications"] {
        removed += conn.execute(
            &format!(
                "DELETE FROM {} WHERE issuer = ?1 AND (?2 IS NULL OR (month = ?2 AND year = ?3))",
                table
            ),
            params![issuer, month, year],
        )?;
    }
    Ok(removed)
}

/// A row whose month is out of range reads as `None`
fn row_to_verification(row: &Row<'_>) -> rusqlite::Result<Option<MonthlyVerification>> {
    let Some(period) = StatementPeriod::new(row.get(1)?, row.get(2)?) else {
        return Ok(None);
    };
    Ok(Some(MonthlyVerification {
        issuer: row.get(0)?,
        period,
        reported_total: row.get(3)?,
        computed_total: row.get(4)?,
        verified: row.get(5)?,
        diff: row.get(6)?,
    }))
}

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<Option<StoredStatementSummary>> {
    let Some(period) = StatementPeriod::new(row.get(1)?, row.get(2)?) else {
        return Ok(None);
    };
    let due_date: Option<String> = row.get(5)?;
    let updated_at: String = row.get(7)?;
    Ok(Some(StoredStatementSummary {
        issuer: row.get(0)?,
        period,
        total_amount_due: row.get(3)?,
        minimum_amount_due: row.get(4)?,
        due_date: due_date.as_deref().map(parse_date).transpose()?,
        transaction_count: row.get(6)?,
        updated_at: parse_datetime(&updated_at),
    }))
}

const SUMMARY_COLUMNS: &str = r#"
    SELECT issuer, month, year, total_amount_due, minimum_amount_due, due_date,
           transaction_count, updated_at
    FROM statement_summaries
"#;

impl Database {
    /// Latest period first
    pub fn list_summaries(&self, issuer: Option<&str>) -> Result<Vec<StoredStatementSummary>> {
        let conn = self.conn()?;
        let sql = format!(
            "{} WHERE (?1 IS NULL OR issuer = ?1) ORDER BY year DESC, month DESC, issuer",
            SUMMARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![issuer], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// Summaries whose due date falls between `today` and `today + days`
    /// (inclusive), soonest first
    pub fn upcoming_due(&self, today: NaiveDate, days: i64) -> Result<Vec<StoredStatementSummary>> {
        let conn = self.conn()?;
        let until = today + chrono::Duration::days(days);
        let sql = format!(
            "{} WHERE due_date BETWEEN ? AND ? ORDER BY due_date, issuer",
            SUMMARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![today.to_string(), until.to_string()], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// Latest period first
    pub fn list_verifications(&self, issuer: Option<&str>) -> Result<Vec<MonthlyVerification>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT issuer, month, year, reported_total, computed_total, verified, diff
            FROM monthly_verifications
            WHERE (?1 IS NULL OR issuer = ?1)
            ORDER BY year DESC, month DESC, issuer
            "#,
        )?;
        let rows = stmt
            .query_map(params![issuer], row_to_verification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().flatten().collect())
    }

    pub fn get_verification(
        &self,
        issuer: &str,
        period: StatementPeriod,
    ) -> Result<Option<MonthlyVerification>> {
        let conn = self.conn()?;
        get_verification(&conn, issuer, period)
    }

    pub fn is_period_verified(&self, issuer: &str, period: StatementPeriod) -> Result<bool> {
        Ok(self
            .get_verification(issuer, period)?
            .is_some_and(|v| v.verified))
    }
}
