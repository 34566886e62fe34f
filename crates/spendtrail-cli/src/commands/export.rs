//! Export command implementation

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use spendtrail_core::{write_transactions_csv, Database, TransactionExportOptions};

fn parse_date_arg(flag: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .with_context(|| format!("Invalid {} date format (use YYYY-MM-DD)", flag))
        })
        .transpose()
}

pub fn cmd_export(
    db: &Database,
    issuer: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let opts = TransactionExportOptions {
        issuer: issuer.map(String::from),
        from: parse_date_arg("--from", from)?,
        to: parse_date_arg("--to", to)?,
    };

    let transactions = db.export_transactions(&opts)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_transactions_csv(file, &transactions)?;
            eprintln!(
                "✅ Exported {} transactions to {}",
                transactions.len(),
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            write_transactions_csv(&mut handle, &transactions)?;
            handle.flush()?;
        }
    }

    Ok(())
}
