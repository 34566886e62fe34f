//! Stored transactions, reconciliation results and upcoming due dates

use anyhow::Result;
use chrono::NaiveDate;
use spendtrail_core::Database;

use super::truncate;

pub fn cmd_transactions_list(db: &Database, issuer: Option<&str>, limit: i64) -> Result<()> {
    let transactions = db.list_transactions(issuer, limit)?;

    if transactions.is_empty() {
        println!("No transactions found. Ingest some with:");
        println!("  spendtrail ingest --mailbox mailbox.json");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = if tx.amount < 0.0 {
            format!("\x1b[32m-{:.2}\x1b[0m", tx.amount.abs()) // Green for credits
        } else {
            format!("{:.2}", tx.amount)
        };

        println!(
            "   {} │ {:<8} │ {:>10} │ {}",
            tx.transaction_date,
            truncate(&tx.issuer, 8),
            amount_str,
            truncate(&tx.description, 40)
        );
    }

    Ok(())
}

pub fn cmd_verifications(db: &Database, issuer: Option<&str>) -> Result<()> {
    let verifications = db.list_verifications(issuer)?;

    if verifications.is_empty() {
        println!("No statement totals recorded yet.");
        return Ok(());
    }

    println!();
    println!("🧾 Monthly Reconciliation");
    println!("   ─────────────────────────────────────────────────────────────");

    for v in verifications {
        let status = if v.verified {
            "\x1b[32m✓ verified\x1b[0m".to_string()
        } else {
            format!("\x1b[31m✗ off by {:.2}\x1b[0m", v.diff)
        };
        println!(
            "   {} │ {:<8} │ reported {:>10.2} │ computed {:>10.2} │ {}",
            v.period,
            truncate(&v.issuer, 8),
            v.reported_total,
            v.computed_total,
            status
        );
    }

    Ok(())
}

pub fn cmd_due(db: &Database, today: NaiveDate, days: i64) -> Result<()> {
    let upcoming = db.upcoming_due(today, days)?;

    if upcoming.is_empty() {
        println!("No payments due in the next {} days.", days);
        return Ok(());
    }

    println!();
    println!("⏰ Payments due by {}", today + chrono::Duration::days(days));
    for summary in upcoming {
        let total = summary
            .total_amount_due
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "?".to_string());
        println!(
            "   {} │ {:<8} │ {:>10} │ statement {}",
            summary
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            truncate(&summary.issuer, 8),
            total,
            summary.period
        );
    }

    Ok(())
}
