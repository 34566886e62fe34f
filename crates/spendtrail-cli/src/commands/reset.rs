//! Reset command implementation

use anyhow::Result;
use spendtrail_core::{Database, StatementPeriod};

pub fn cmd_reset(
    db: &Database,
    issuer: &str,
    period: Option<StatementPeriod>,
    purge: bool,
) -> Result<()> {
    let scope = match period {
        Some(period) => format!("{} {}", issuer, period),
        None => issuer.to_string(),
    };

    let cleared = db.clear_processed(issuer, period)?;
    println!("🔄 Cleared {} processed messages for {}", cleared, scope);

    if purge {
        let counts = db.purge_issuer(issuer, period)?;
        println!(
            "   Purged {} transactions and {} statement records",
            counts.transactions, counts.summaries
        );
    } else {
        println!("   Stored transactions kept; re-ingesting skips duplicates");
    }

    Ok(())
}
