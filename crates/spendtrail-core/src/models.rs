//! Data models for statement extraction and storage

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a document's text came from inside one email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DocumentOrigin {
    /// The email body text
    Body,
    /// A PDF attachment, identified by its filename
    PdfAttachment { filename: String },
}

impl DocumentOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Body => "body",
            Self::PdfAttachment { filename } => filename,
        }
    }
}

impl std::fmt::Display for DocumentOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body => write!(f, "body"),
            Self::PdfAttachment { filename } => write!(f, "attachment {}", filename),
        }
    }
}

/// One candidate source of transactions (immutable, discarded after extraction)
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub origin: DocumentOrigin,
    /// Issuer identity this document is being parsed under
    pub issuer_hint: String,
    /// Plain text, pages concatenated
    pub text: String,
    /// Key that was used to open the source, if any
    pub decryption_key: Option<String>,
}

impl RawDocument {
    pub fn body(issuer_hint: &str, text: &str) -> Self {
        Self {
            origin: DocumentOrigin::Body,
            issuer_hint: issuer_hint.to_string(),
            text: text.to_string(),
            decryption_key: None,
        }
    }
}

/// Binary attachment as delivered by the mail transport
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Only `.pdf` attachments are treated as statement documents
    pub fn is_pdf(&self) -> bool {
        self.filename.to_lowercase().ends_with(".pdf")
    }
}

/// Email as delivered by the (external) mail transport
#[derive(Debug, Clone)]
pub struct RawEmailRecord {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub date: Option<NaiveDate>,
    pub body_text: String,
    pub attachments: Vec<Attachment>,
}

/// A row as the grammar saw it, before any normalization
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    pub date: String,
    pub description: String,
    pub amount: String,
    /// Grammar saw an explicit credit marker next to the amount
    pub credit: bool,
    pub points: Option<String>,
    pub classification: Option<String>,
}

impl RawRow {
    pub fn new(date: &str, description: &str, amount: &str) -> Self {
        Self {
            date: date.trim().to_string(),
            description: description.trim().to_string(),
            amount: amount.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_credit(mut self, credit: bool) -> Self {
        self.credit = credit;
        self
    }

    pub fn with_points(mut self, points: Option<&str>) -> Self {
        self.points = points.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        self
    }

    pub fn with_classification(mut self, classification: Option<&str>) -> Self {
        self.classification = classification
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }

    /// Append a continuation line to the description
    pub fn continue_description(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(line);
    }
}

/// One parsed spend/refund line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCandidate {
    pub transaction_date: NaiveDate,
    pub description: String,
    /// Bounded-length label derived from the description
    pub merchant: String,
    /// Negative = credit/refund/offset
    pub amount: f64,
    pub points: Option<f64>,
    /// Issuer-reported category, if the statement carries one
    pub classification: Option<String>,
}

/// The (month, year) a statement covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub year: i32,
    pub month: u32,
}

impl StatementPeriod {
    pub fn new(month: u32, year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Period of the latest transaction date
    pub fn latest_of(candidates: &[TransactionCandidate]) -> Option<Self> {
        candidates
            .iter()
            .map(|c| c.transaction_date)
            .max()
            .map(Self::of)
    }

    /// First and last calendar day of the period (inclusive)
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN);
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        let last = next.and_then(|d| d.pred_opt()).unwrap_or(first);
        (first, last)
    }
}

impl std::fmt::Display for StatementPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Per-document statement metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub total_amount_due: Option<f64>,
    pub minimum_amount_due: Option<f64>,
    pub payment_due_date: Option<NaiveDate>,
    pub statement_period: Option<StatementPeriod>,
}

/// Record that a message has been fully handled for one issuer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEmailMarker {
    pub message_id: String,
    pub issuer: String,
    pub subject: Option<String>,
    pub message_date: Option<NaiveDate>,
    pub processed_at: DateTime<Utc>,
}

/// Reported vs computed totals for one issuer and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyVerification {
    pub issuer: String,
    pub period: StatementPeriod,
    pub reported_total: f64,
    pub computed_total: f64,
    pub verified: bool,
    /// reported - computed, rounded to 2 decimals
    pub diff: f64,
}

/// Stored statement summary row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredStatementSummary {
    pub issuer: String,
    pub period: StatementPeriod,
    pub total_amount_due: Option<f64>,
    pub minimum_amount_due: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub transaction_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// A transaction as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: i64,
    pub issuer: String,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub merchant: String,
    pub amount: f64,
    pub points: Option<f64>,
    pub classification: Option<String>,
    pub category: Option<String>,
    pub statement_period: Option<StatementPeriod>,
    pub import_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Handed to the categorizer for every newly inserted row
#[derive(Debug, Clone, PartialEq)]
pub struct NewlyInserted {
    pub id: i64,
    pub description: String,
    pub merchant: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Rows were merged (possibly zero of them new)
    Ingested,
    /// The statement period was already verified; nothing written
    SkippedVerified,
}

/// Result of ingesting one email's extraction
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub outcome: IngestOutcome,
    pub period: Option<StatementPeriod>,
    pub inserted: usize,
    pub duplicates: usize,
    pub new_transactions: Vec<NewlyInserted>,
    pub verification: Option<MonthlyVerification>,
}
