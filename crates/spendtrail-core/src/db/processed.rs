//! Processed-email markers

use rusqlite::{params, Connection};
use tracing::info;

use super::{format_datetime, parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{ProcessedEmailMarker, StatementPeriod};

/// Insert-if-absent; returns whether a new marker was written
pub(crate) fn insert_marker(conn: &Connection, marker: &ProcessedEmailMarker) -> Result<bool> {
    let changed = conn.execute(
        r#"
        INSERT OR IGNORE INTO processed_emails (message_id, issuer, subject, message_date, processed_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            marker.message_id,
            marker.issuer,
            marker.subject,
            marker.message_date.map(|d| d.to_string()),
            format_datetime(&marker.processed_at),
        ],
    )?;
    Ok(changed > 0)
}

impl Database {
    pub fn is_processed(&self, message_id: &str, issuer: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM processed_emails WHERE message_id = ? AND issuer = ?",
            params![message_id, issuer],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a handled message; a second call for the same key is a no-op
    pub fn mark_processed(&self, marker: &ProcessedEmailMarker) -> Result<bool> {
        let conn = self.conn()?;
        insert_marker(&conn, marker)
    }

    /// Newest first
    pub fn list_processed(&self, issuer: &str) -> Result<Vec<ProcessedEmailMarker>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT message_id, issuer, subject, message_date, processed_at
            FROM processed_emails WHERE issuer = ?
            ORDER BY processed_at DESC, id DESC
            "#,
        )?;
        let markers = stmt
            .query_map(params![issuer], |row| {
                let message_date: Option<String> = row.get(3)?;
                let processed_at: String = row.get(4)?;
                Ok(ProcessedEmailMarker {
                    message_id: row.get(0)?,
                    issuer: row.get(1)?,
                    subject: row.get(2)?,
                    message_date: message_date.as_deref().map(parse_date).transpose()?,
                    processed_at: parse_datetime(&processed_at),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(markers)
    }

    /// Forget handled messages so a later run reprocesses them.
    ///
    /// With a period, only markers whose message date falls in that month are
    /// cleared; markers without a message date are kept.
    pub fn clear_processed(&self, issuer: &str, period: Option<StatementPeriod>) -> Result<usize> {
        let conn = self.conn()?;
        let removed = match period {
            Some(period) => {
                let (first, last) = period.bounds();
                conn.execute(
                    "DELETE FROM processed_emails WHERE issuer = ? AND message_date BETWEEN ? AND ?",
                    params![issuer, first.to_string(), last.to_string()],
                )?
            }
            None => conn.execute("DELETE FROM processed_emails WHERE issuer = ?", params![issuer])?,
        };

        info!("Cleared {} processed markers for {}", removed, issuer);
        Ok(removed)
    }
}
