//! CSV export of stored transactions

use std::io::Write;

use chrono::NaiveDate;
use rusqlite::params;
use serde::Serialize;

use crate::db::{row_to_transaction, Database, SELECT_COLUMNS};
use crate::error::{Error, Result};
use crate::models::StoredTransaction;

/// Options for transaction export
#[derive(Debug, Clone, Default)]
pub struct TransactionExportOptions {
    pub issuer: Option<String>,
    /// Start date filter (inclusive)
    pub from: Option<NaiveDate>,
    /// End date filter (inclusive)
    pub to: Option<NaiveDate>,
}

/// One CSV line
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Issuer")]
    issuer: &'a str,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "Merchant")]
    merchant: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Points")]
    points: Option<f64>,
    #[serde(rename = "Classification")]
    classification: Option<&'a str>,
    #[serde(rename = "Category")]
    category: Option<&'a str>,
}

impl<'a> From<&'a StoredTransaction> for ExportRow<'a> {
    fn from(tx: &'a StoredTransaction) -> Self {
        Self {
            date: tx.transaction_date.to_string(),
            issuer: &tx.issuer,
            description: &tx.description,
            merchant: &tx.merchant,
            amount: format!("{:.2}", tx.amount),
            points: tx.points,
            classification: tx.classification.as_deref(),
            category: tx.category.as_deref(),
        }
    }
}

/// Write `Date,Issuer,Description,Merchant,Amount,Points,Classification,Category`
pub fn write_transactions_csv<W: Write>(writer: W, transactions: &[StoredTransaction]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if transactions.is_empty() {
        // serialize() only emits the header with the first record
        wtr.write_record([
            "Date",
            "Issuer",
            "Description",
            "Merchant",
            "Amount",
            "Points",
            "Classification",
            "Category",
        ])?;
    }
    for tx in transactions {
        wtr.serialize(ExportRow::from(tx))?;
    }
    wtr.flush()?;
    Ok(())
}

impl Database {
    /// Stored transactions matching the options, oldest first
    pub fn export_transactions(&self, opts: &TransactionExportOptions) -> Result<Vec<StoredTransaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"{}
            WHERE (?1 IS NULL OR issuer = ?1)
              AND (?2 IS NULL OR transaction_date >= ?2)
              AND (?3 IS NULL OR transaction_date <= ?3)
            ORDER BY transaction_date, id
            "#,
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    opts.issuer,
                    opts.from.map(|d| d.to_string()),
                    opts.to.map(|d| d.to_string())
                ],
                row_to_transaction,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Export matching transactions as CSV text
    pub fn export_transactions_csv(&self, opts: &TransactionExportOptions) -> Result<String> {
        let transactions = self.export_transactions(opts)?;
        let mut buf = Vec::new();
        write_transactions_csv(&mut buf, &transactions)?;
        String::from_utf8(buf).map_err(|e| Error::InvalidData(e.to_string()))
    }
}
