//! Ingestion and reconciliation
//!
//! One email's candidates are merged into storage inside a single SQLite
//! transaction: rows, statement summary, verification and the processed
//! marker commit together. A period already verified is a skip-gate; its
//! stored rows are never touched again, but the message is still marked.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::db::{self, Database};
use crate::error::Result;
use crate::models::{
    IngestOutcome, IngestResult, MonthlyVerification, NewlyInserted, ProcessedEmailMarker,
    RawEmailRecord, StatementPeriod, StatementSummary, TransactionCandidate,
};
use crate::normalize::round2;

/// Largest |reported - computed| still counted as verified
pub const VERIFY_TOLERANCE: f64 = 1.0;

/// The message a batch of candidates came from
#[derive(Debug, Clone, Copy)]
pub struct SourceMessage<'a> {
    pub id: &'a str,
    pub subject: Option<&'a str>,
    pub date: Option<NaiveDate>,
}

impl<'a> SourceMessage<'a> {
    pub fn new(id: &'a str) -> Self {
        Self {
            id,
            subject: None,
            date: None,
        }
    }
}

impl<'a> From<&'a RawEmailRecord> for SourceMessage<'a> {
    fn from(email: &'a RawEmailRecord) -> Self {
        Self {
            id: &email.id,
            subject: Some(email.subject.as_str()).filter(|s| !s.is_empty()),
            date: email.date,
        }
    }
}

/// Build the verification record for a period
pub fn reconcile(
    issuer: &str,
    period: StatementPeriod,
    reported_total: f64,
    computed_total: f64,
) -> MonthlyVerification {
    let diff = round2(reported_total - computed_total);
    MonthlyVerification {
        issuer: issuer.to_string(),
        period,
        reported_total,
        computed_total,
        verified: diff.abs() <= VERIFY_TOLERANCE,
        diff,
    }
}

/// The period a batch belongs to: the summary's, else the month of the
/// latest transaction
pub fn statement_period_of(
    candidates: &[TransactionCandidate],
    summary: Option<&StatementSummary>,
) -> Option<StatementPeriod> {
    summary
        .and_then(|s| s.statement_period)
        .or_else(|| StatementPeriod::latest_of(candidates))
}

/// Merge one email's extraction into storage.
///
/// Duplicates by (issuer, date, amount, description) are dropped silently.
/// The source message is marked processed whether or not rows were written.
pub fn ingest(
    db: &Database,
    issuer: &str,
    candidates: &[TransactionCandidate],
    summary: Option<&StatementSummary>,
    due_date: Option<NaiveDate>,
    source: SourceMessage<'_>,
) -> Result<IngestResult> {
    let period = statement_period_of(candidates, summary);
    let marker = ProcessedEmailMarker {
        message_id: source.id.to_string(),
        issuer: issuer.to_string(),
        subject: source.subject.map(str::to_string),
        message_date: source.date,
        processed_at: Utc::now(),
    };

    db.with_transaction(|tx| {
        if let Some(period) = period {
            let existing = db::get_verification(tx, issuer, period)?;
            if existing.as_ref().is_some_and(|v| v.verified) {
                info!(
                    "{}: period {} already verified, skipping message {}",
                    issuer, period, source.id
                );
                db::insert_marker(tx, &marker)?;
                return Ok(IngestResult {
                    outcome: IngestOutcome::SkippedVerified,
                    period: Some(period),
                    inserted: 0,
                    duplicates: 0,
                    new_transactions: Vec::new(),
                    verification: existing,
                });
            }
        }

        let mut new_transactions = Vec::new();
        let mut duplicates = 0;
        for candidate in candidates {
            match db::insert_candidate(tx, issuer, candidate, period, source.id)? {
                Some(id) => new_transactions.push(NewlyInserted {
                    id,
                    description: candidate.description.clone(),
                    merchant: candidate.merchant.clone(),
                }),
                None => duplicates += 1,
            }
        }
        debug!(
            "{}: {} inserted, {} duplicates from message {}",
            issuer,
            new_transactions.len(),
            duplicates,
            source.id
        );

        let mut verification = None;
        if let Some(period) = period {
            let mut summary = summary.cloned().unwrap_or_default();
            summary.payment_due_date = summary.payment_due_date.or(due_date);
            let stored = db::count_period(tx, issuer, period)?;
            if summary != StatementSummary::default() {
                db::upsert_summary(tx, issuer, period, &summary, stored)?;
            } else {
                db::set_summary_count(tx, issuer, period, stored)?;
            }

            // The first reported total kept in the summary is the one every
            // later document reconciles against, with or without its own total
            let reported = db::summary_total(tx, issuer, period)?;

            if let Some(reported) = reported {
                let computed = db::sum_period(tx, issuer, period)?;
                let v = reconcile(issuer, period, reported, computed);
                if !v.verified {
                    warn!(
                        "{}: {} reported {:.2} but stored rows sum to {:.2} (diff {:.2})",
                        issuer, period, v.reported_total, v.computed_total, v.diff
                    );
                }
                db::upsert_verification(tx, &v)?;
                verification = Some(v);
            }
        }

        db::insert_marker(tx, &marker)?;

        Ok(IngestResult {
            outcome: IngestOutcome::Ingested,
            period,
            inserted: new_transactions.len(),
            duplicates,
            new_transactions,
            verification,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(date: (i32, u32, u32), description: &str, amount: f64) -> TransactionCandidate {
        TransactionCandidate {
            transaction_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: description.to_string(),
            merchant: description.to_string(),
            amount,
            points: None,
            classification: None,
        }
    }

    fn summary(total: f64, month: u32, year: i32) -> StatementSummary {
        StatementSummary {
            total_amount_due: Some(total),
            statement_period: StatementPeriod::new(month, year),
            ..Default::default()
        }
    }

    #[test]
    fn test_reconcile_tolerance() {
        let p = StatementPeriod::new(8, 2025).unwrap();
        assert!(reconcile("X", p, 1000.0, 999.01).verified);
        assert!(reconcile("X", p, 1000.0, 1001.0).verified);
        let off = reconcile("X", p, 1000.0, 998.5);
        assert!(!off.verified);
        assert_eq!(off.diff, 1.5);
    }

    #[test]
    fn test_period_prefers_summary() {
        let rows = vec![candidate((2025, 9, 2), "LATE ROW", 1.0)];
        let s = summary(1.0, 8, 2025);
        assert_eq!(
            statement_period_of(&rows, Some(&s)),
            StatementPeriod::new(8, 2025)
        );
        assert_eq!(statement_period_of(&rows, None), StatementPeriod::new(9, 2025));
        assert_eq!(statement_period_of(&[], None), None);
    }

    #[test]
    fn test_ingest_twice_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let rows = vec![
            candidate((2025, 8, 1), "SHOP ONE", 100.0),
            candidate((2025, 8, 2), "SHOP TWO", 50.0),
        ];
        let s = summary(150.0, 8, 2025);

        let first = ingest(&db, "SBI", &rows, Some(&s), None, SourceMessage::new("m1")).unwrap();
        assert_eq!(first.inserted, 2);
        assert!(first.verification.unwrap().verified);

        // The verified period now gates the same message
        let again = ingest(&db, "SBI", &rows, Some(&s), None, SourceMessage::new("m1")).unwrap();
        assert_eq!(again.outcome, IngestOutcome::SkippedVerified);
        assert_eq!(db.count_transactions(Some("SBI")).unwrap(), 2);
        assert_eq!(db.list_processed("SBI").unwrap().len(), 1);
    }

    #[test]
    fn test_duplicates_dropped_when_unverified() {
        let db = Database::in_memory().unwrap();
        let rows = vec![candidate((2025, 8, 1), "SHOP ONE", 100.0)];
        let s = summary(500.0, 8, 2025);

        ingest(&db, "HDFC", &rows, Some(&s), None, SourceMessage::new("m1")).unwrap();
        let second = ingest(&db, "HDFC", &rows, Some(&s), None, SourceMessage::new("m2")).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);

        let v = second.verification.unwrap();
        assert!(!v.verified);
        assert_eq!(v.diff, 400.0);
    }

    #[test]
    fn test_due_date_fills_summary() {
        let db = Database::in_memory().unwrap();
        let rows = vec![candidate((2025, 8, 1), "SHOP ONE", 100.0)];
        let due = NaiveDate::from_ymd_opt(2025, 9, 4);
        ingest(&db, "HDFC", &rows, None, due, SourceMessage::new("m1")).unwrap();

        let summaries = db.list_summaries(Some("HDFC")).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].due_date, due);
        assert_eq!(summaries[0].total_amount_due, None);
        // no reported total anywhere, so nothing to verify
        assert!(db.list_verifications(Some("HDFC")).unwrap().is_empty());
    }

    #[test]
    fn test_later_document_rechecks_earlier_total() {
        let db = Database::in_memory().unwrap();
        let s = summary(150.0, 8, 2025);
        let first = vec![candidate((2025, 8, 1), "SHOP ONE", 100.0)];
        let r = ingest(&db, "AMEX", &first, Some(&s), None, SourceMessage::new("m1")).unwrap();
        assert!(!r.verification.unwrap().verified);

        let second = vec![candidate((2025, 8, 9), "SHOP TWO", 50.0)];
        let r = ingest(&db, "AMEX", &second, None, None, SourceMessage::new("m2")).unwrap();
        let v = r.verification.unwrap();
        assert!(v.verified);
        assert_eq!(v.computed_total, 150.0);
    }

    #[test]
    fn test_first_reported_total_drives_verification() {
        let db = Database::in_memory().unwrap();
        let first = vec![
            candidate((2025, 8, 1), "SHOP ONE", 400.0),
            candidate((2025, 8, 2), "SHOP TWO", 200.0),
        ];
        let r = ingest(&db, "SBI", &first, Some(&summary(1000.0, 8, 2025)), None, SourceMessage::new("m1"))
            .unwrap();
        assert!(!r.verification.unwrap().verified);

        // A reissued document for the same month reports a different total
        let second = vec![candidate((2025, 8, 3), "SHOP THREE", 250.0)];
        let r = ingest(&db, "SBI", &second, Some(&summary(2000.0, 8, 2025)), None, SourceMessage::new("m2"))
            .unwrap();
        let v = r.verification.unwrap();
        assert_eq!(v.reported_total, 1000.0);
        assert_eq!(v.computed_total, 850.0);

        let august = StatementPeriod::new(8, 2025).unwrap();
        let stored = db.get_verification("SBI", august).unwrap().unwrap();
        let summaries = db.list_summaries(Some("SBI")).unwrap();
        assert_eq!(summaries[0].total_amount_due, Some(stored.reported_total));
        assert_eq!(summaries[0].transaction_count, 3);

        // A document without a summary still refreshes the count
        let third = vec![candidate((2025, 8, 4), "SHOP FOUR", 10.0)];
        ingest(&db, "SBI", &third, None, None, SourceMessage::new("m3")).unwrap();
        assert_eq!(db.list_summaries(Some("SBI")).unwrap()[0].transaction_count, 4);
    }

    #[test]
    fn test_empty_extraction_still_marks_processed() {
        let db = Database::in_memory().unwrap();
        let r = ingest(&db, "ICICI", &[], None, None, SourceMessage::new("m9")).unwrap();
        assert_eq!(r.outcome, IngestOutcome::Ingested);
        assert_eq!(r.period, None);
        assert!(db.is_processed("m9", "ICICI").unwrap());
    }
}
