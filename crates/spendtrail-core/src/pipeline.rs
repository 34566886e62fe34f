//! Sequential pipeline runner
//!
//! One issuer at a time, one email at a time. Each email is dispatched and
//! ingested on its own, so an interrupted run resumes with whatever was not
//! yet marked processed.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::IssuerConfig;
use crate::db::Database;
use crate::dispatch::{Dispatcher, ParsedStatement};
use crate::document::DocumentReader;
use crate::error::Result;
use crate::ingest::{ingest, SourceMessage};
use crate::models::{IngestOutcome, IngestResult, RawEmailRecord};
use crate::strategy::StrategyRegistry;

/// Assigns a category to a newly stored transaction
pub trait Categorizer {
    fn categorize(&self, description: &str, merchant: &str) -> Option<String>;
}

/// Counters for one issuer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssuerRunStats {
    pub seen: usize,
    /// Subject did not match the issuer's filter
    pub filtered: usize,
    pub skipped_processed: usize,
    pub processed: usize,
    pub skipped_verified: usize,
    pub failed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub categorized: usize,
}

impl IssuerRunStats {
    pub fn absorb(&mut self, other: &IssuerRunStats) {
        self.seen += other.seen;
        self.filtered += other.filtered;
        self.skipped_processed += other.skipped_processed;
        self.processed += other.processed;
        self.skipped_verified += other.skipped_verified;
        self.failed += other.failed;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.categorized += other.categorized;
    }
}

pub struct Pipeline<'a> {
    db: &'a Database,
    dispatcher: Dispatcher<'a>,
    categorizer: Option<&'a dyn Categorizer>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        db: &'a Database,
        registry: &'a StrategyRegistry,
        reader: &'a dyn DocumentReader,
    ) -> Self {
        Self {
            db,
            dispatcher: Dispatcher::new(registry, reader),
            categorizer: None,
        }
    }

    pub fn with_categorizer(mut self, categorizer: &'a dyn Categorizer) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    /// Extract one email without touching storage
    pub fn parse_email(&self, issuer: &IssuerConfig, email: &RawEmailRecord) -> ParsedStatement {
        self.dispatcher.process_email(
            &issuer.identity,
            &issuer.strategy_key(),
            issuer.decryption_key.as_deref(),
            email,
        )
    }

    /// Extract and ingest one email
    pub fn process_email(&self, issuer: &IssuerConfig, email: &RawEmailRecord) -> Result<IngestResult> {
        let parsed = self.parse_email(issuer, email);
        ingest(
            self.db,
            &issuer.identity,
            &parsed.transactions,
            parsed.summary.as_ref(),
            parsed.due_date,
            SourceMessage::from(email),
        )
    }

    /// Process every email for one issuer, in order
    pub fn run_issuer(&self, issuer: &IssuerConfig, emails: &[RawEmailRecord]) -> Result<IssuerRunStats> {
        let mut stats = IssuerRunStats::default();

        for email in emails {
            stats.seen += 1;

            if !issuer.matches_subject(&email.subject) {
                debug!("{}: subject '{}' filtered out", issuer.identity, email.subject);
                stats.filtered += 1;
                continue;
            }
            if self.db.is_processed(&email.id, &issuer.identity)? {
                debug!("{}: message {} already processed", issuer.identity, email.id);
                stats.skipped_processed += 1;
                continue;
            }

            let result = match self.process_email(issuer, email) {
                Ok(result) => result,
                Err(e) => {
                    // Not marked processed, so the next run retries it
                    warn!("{}: failed to ingest message {}: {}", issuer.identity, email.id, e);
                    stats.failed += 1;
                    continue;
                }
            };

            match result.outcome {
                IngestOutcome::SkippedVerified => stats.skipped_verified += 1,
                IngestOutcome::Ingested => stats.processed += 1,
            }
            stats.inserted += result.inserted;
            stats.duplicates += result.duplicates;
            stats.categorized += self.categorize(&result);

            info!(
                "{}: message {} -> {} new, {} duplicate{}",
                issuer.identity,
                email.id,
                result.inserted,
                result.duplicates,
                match (&result.outcome, &result.verification) {
                    (IngestOutcome::SkippedVerified, _) => " (period already verified)".to_string(),
                    (_, Some(v)) if v.verified => format!(", {} verified", v.period),
                    (_, Some(v)) => format!(", {} off by {:.2}", v.period, v.diff),
                    (_, None) => String::new(),
                }
            );
        }

        info!(
            "{}: {} seen, {} processed, {} already processed, {} verified skips, {} failed",
            issuer.identity,
            stats.seen,
            stats.processed,
            stats.skipped_processed,
            stats.skipped_verified,
            stats.failed
        );
        Ok(stats)
    }

    fn categorize(&self, result: &IngestResult) -> usize {
        let Some(categorizer) = self.categorizer else {
            return 0;
        };

        let mut assigned = 0;
        for row in &result.new_transactions {
            let Some(category) = categorizer.categorize(&row.description, &row.merchant) else {
                continue;
            };
            match self.db.set_transaction_category(row.id, &category) {
                Ok(()) => assigned += 1,
                Err(e) => warn!("Failed to set category for transaction {}: {}", row.id, e),
            }
        }
        assigned
    }
}
