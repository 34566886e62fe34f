//! Mailbox ingestion

use std::path::Path;

use anyhow::{Context, Result};
use spendtrail_core::{
    load_mailbox, AppConfig, Database, DocumentReader, IssuerRunStats, PdfTextReader, Pipeline,
    RawEmailRecord,
};
use tracing::info;

use super::parse::issuer_for;

/// Messages grouped by issuer, issuers in first-seen order
fn group_by_issuer(messages: Vec<(String, RawEmailRecord)>) -> Vec<(String, Vec<RawEmailRecord>)> {
    let mut groups: Vec<(String, Vec<RawEmailRecord>)> = Vec::new();
    for (issuer, record) in messages {
        match groups
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&issuer))
        {
            Some((_, records)) => records.push(record),
            None => groups.push((issuer, vec![record])),
        }
    }
    groups
}

/// Run every message of a mailbox file through the pipeline, one issuer at a time
pub fn ingest_mailbox(
    db: &Database,
    config: &AppConfig,
    reader: &dyn DocumentReader,
    mailbox: &Path,
) -> Result<Vec<(String, IssuerRunStats)>> {
    let messages = load_mailbox(mailbox)
        .with_context(|| format!("Failed to load mailbox: {}", mailbox.display()))?;
    info!("Loaded {} messages from {}", messages.len(), mailbox.display());

    let registry = config
        .build_registry()
        .context("Failed to build strategy registry")?;
    let pipeline = Pipeline::new(db, &registry, reader);

    let mut results = Vec::new();
    for (name, records) in group_by_issuer(messages) {
        let issuer = issuer_for(config, &name);
        let stats = pipeline
            .run_issuer(&issuer, &records)
            .with_context(|| format!("Failed to process issuer {}", issuer.identity))?;
        results.push((issuer.identity, stats));
    }

    Ok(results)
}

pub fn cmd_ingest(db: &Database, config: &AppConfig, mailbox: &Path) -> Result<()> {
    println!("📥 Ingesting {}...", mailbox.display());

    let results = ingest_mailbox(db, config, &PdfTextReader::new(), mailbox)?;

    let mut total = IssuerRunStats::default();
    for (issuer, stats) in &results {
        println!(
            "   {:<12} {} new, {} duplicate, {} skipped, {} failed",
            issuer,
            stats.inserted,
            stats.duplicates,
            stats.skipped_processed + stats.skipped_verified + stats.filtered,
            stats.failed
        );
        total.absorb(stats);
    }

    println!(
        "✅ {} messages processed, {} transactions added",
        total.processed, total.inserted
    );
    if total.failed > 0 {
        println!(
            "   ⚠️  {} messages failed and will be retried on the next run",
            total.failed
        );
    }

    Ok(())
}
