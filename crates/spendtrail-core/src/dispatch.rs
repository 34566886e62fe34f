//! Extraction dispatch
//!
//! Runs every source of one email (body text, then each PDF attachment in
//! order) through the issuer's strategy, falling back to the generic
//! extractor when the strategy is missing or finds nothing. A source that
//! fails only costs its own rows.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::document::DocumentReader;
use crate::error::Error;
use crate::fallback::{extract_generic, FallbackMode};
use crate::models::{
    DocumentOrigin, RawDocument, RawEmailRecord, StatementPeriod, StatementSummary,
    TransactionCandidate,
};
use crate::strategy::{finalize_rows, ScanContext, StrategyRegistry};
use crate::summary;

/// Where one document is in its extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    New,
    Segmented,
    RowsExtracted,
    Normalized,
    Done,
    Failed(String),
}

/// Which extractor produced a document's rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPath {
    Strategy(String),
    Fallback(FallbackMode),
    Nothing,
}

/// Result of running one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentExtraction {
    pub origin: DocumentOrigin,
    pub stage: DocumentStage,
    pub path: ExtractionPath,
    pub rows: Vec<TransactionCandidate>,
    pub summary: Option<StatementSummary>,
    pub due_date: Option<NaiveDate>,
    pub statement_period: Option<StatementPeriod>,
}

impl DocumentExtraction {
    fn new(origin: DocumentOrigin) -> Self {
        Self {
            origin,
            stage: DocumentStage::New,
            path: ExtractionPath::Nothing,
            rows: Vec::new(),
            summary: None,
            due_date: None,
            statement_period: None,
        }
    }

    fn failed(origin: DocumentOrigin, reason: String) -> Self {
        Self {
            stage: DocumentStage::Failed(reason),
            ..Self::new(origin)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.stage, DocumentStage::Failed(_))
    }
}

/// Merged extraction of one email
#[derive(Debug, Clone, Serialize)]
pub struct ParsedStatement {
    pub message_id: String,
    pub issuer: String,
    /// Rows from every source, in source order
    pub transactions: Vec<TransactionCandidate>,
    /// From the first source that had one
    pub summary: Option<StatementSummary>,
    /// From the first source that had one
    pub due_date: Option<NaiveDate>,
    pub documents: Vec<DocumentExtraction>,
}

impl ParsedStatement {
    pub fn failed_documents(&self) -> impl Iterator<Item = &DocumentExtraction> {
        self.documents.iter().filter(|d| d.is_failed())
    }
}

/// Picks a strategy per issuer and runs each source of an email through it
pub struct Dispatcher<'a> {
    registry: &'a StrategyRegistry,
    reader: &'a dyn DocumentReader,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a StrategyRegistry, reader: &'a dyn DocumentReader) -> Self {
        Self { registry, reader }
    }

    /// Extract one text document with the strategy registered under `strategy_key`
    pub fn extract_document(&self, strategy_key: &str, doc: &RawDocument) -> DocumentExtraction {
        let mut out = DocumentExtraction::new(doc.origin.clone());
        let text = doc.text.as_str();

        if text.trim().is_empty() {
            out.stage = DocumentStage::Failed("document has no text".to_string());
            return out;
        }

        let lines: Vec<&str> = text.lines().collect();
        out.statement_period = summary::extract_statement_period(text);
        let ctx = ScanContext {
            statement_period: out.statement_period,
        };

        match self.registry.get(strategy_key) {
            Some(strategy) => {
                match strategy.segment(&lines) {
                    Ok(ranges) => {
                        out.stage = DocumentStage::Segmented;
                        let raw: Vec<_> = ranges
                            .into_iter()
                            .flat_map(|range| strategy.scan_rows(&lines[range], &ctx))
                            .collect();
                        out.stage = DocumentStage::RowsExtracted;
                        out.rows = finalize_rows(strategy.key(), raw);
                        out.stage = DocumentStage::Normalized;
                        if !out.rows.is_empty() {
                            out.path = ExtractionPath::Strategy(strategy.key().to_string());
                        }
                    }
                    Err(Error::SegmentNotFound(_)) => {
                        debug!(
                            "{}: no transaction section in {}, using fallback",
                            strategy.key(),
                            doc.origin
                        );
                    }
                    Err(e) => warn!("{}: segmenting {} failed: {}", strategy.key(), doc.origin, e),
                }
                out.summary = strategy.extract_summary(text);
                out.due_date = strategy.extract_due_date(text);
            }
            None => {
                debug!("No strategy registered for '{}', using fallback", strategy_key);
                out.summary = summary::extract_summary(text);
                out.due_date = summary::extract_due_date(text);
            }
        }

        if out.rows.is_empty() {
            let (rows, mode) = extract_generic(text);
            out.rows = rows;
            if let Some(mode) = mode {
                out.path = ExtractionPath::Fallback(mode);
            }
            out.stage = DocumentStage::Normalized;
        }

        debug!(
            "{}: {} rows via {:?}, summary {}",
            doc.origin,
            out.rows.len(),
            out.path,
            if out.summary.is_some() { "found" } else { "absent" }
        );
        out.stage = DocumentStage::Done;
        out
    }

    /// Extract every source of one email and merge the results.
    ///
    /// Only attachments named `*.pdf` are read. The summary and due date come
    /// from the first source that has one; later sources never replace them.
    pub fn process_email(
        &self,
        issuer: &str,
        strategy_key: &str,
        decryption_key: Option<&str>,
        email: &RawEmailRecord,
    ) -> ParsedStatement {
        let mut documents = Vec::new();

        if !email.body_text.trim().is_empty() {
            let body = RawDocument::body(issuer, &email.body_text);
            documents.push(self.extract_document(strategy_key, &body));
        }

        for attachment in email.attachments.iter().filter(|a| a.is_pdf()) {
            let origin = DocumentOrigin::PdfAttachment {
                filename: attachment.filename.clone(),
            };
            match self.reader.read_text(&attachment.bytes, decryption_key) {
                Ok(text) => {
                    let doc = RawDocument {
                        origin,
                        issuer_hint: issuer.to_string(),
                        text,
                        decryption_key: decryption_key.map(str::to_string),
                    };
                    documents.push(self.extract_document(strategy_key, &doc));
                }
                Err(e) => {
                    warn!(
                        "{}: skipping attachment '{}' of message {}: {}",
                        issuer, attachment.filename, email.id, e
                    );
                    documents.push(DocumentExtraction::failed(origin, e.to_string()));
                }
            }
        }

        merge(issuer, &email.id, documents)
    }
}

fn merge(issuer: &str, message_id: &str, documents: Vec<DocumentExtraction>) -> ParsedStatement {
    let transactions = documents.iter().flat_map(|d| d.rows.clone()).collect();
    let due_date = documents.iter().find_map(|d| d.due_date);
    let period = documents.iter().find_map(|d| d.statement_period);

    let summary = documents.iter().find_map(|d| d.summary.clone()).map(|mut s| {
        s.payment_due_date = s.payment_due_date.or(due_date);
        s.statement_period = s.statement_period.or(period);
        s
    });

    ParsedStatement {
        message_id: message_id.to_string(),
        issuer: issuer.to_string(),
        transactions,
        summary,
        due_date,
        documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::Attachment;

    /// Attachment bytes are the text itself; `LOCKED` files need key "pw"
    struct FakeReader;

    impl DocumentReader for FakeReader {
        fn read_text(&self, bytes: &[u8], key: Option<&str>) -> Result<String> {
            let text = String::from_utf8_lossy(bytes).to_string();
            if text.starts_with("LOCKED") && key != Some("pw") {
                return Err(Error::DocumentOpen("bad password".into()));
            }
            Ok(text)
        }
    }

    fn email(body: &str, attachments: Vec<(&str, &str)>) -> RawEmailRecord {
        RawEmailRecord {
            id: "msg-1".into(),
            subject: "Your statement".into(),
            sender: "statements@bank.example".into(),
            date: None,
            body_text: body.into(),
            attachments: attachments
                .into_iter()
                .map(|(name, text)| Attachment {
                    filename: name.into(),
                    content_type: "application/pdf".into(),
                    bytes: text.as_bytes().to_vec(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_strategy_path() {
        let registry = StrategyRegistry::with_builtins();
        let dispatcher = Dispatcher::new(&registry, &FakeReader);
        let doc = RawDocument::body(
            "SBI",
            "TRANSACTIONS FOR A\n01 Aug 25 SHOP ONE 10.00 D\nREWARD SUMMARY",
        );
        let out = dispatcher.extract_document("sbi", &doc);
        assert_eq!(out.stage, DocumentStage::Done);
        assert_eq!(out.path, ExtractionPath::Strategy("sbi".into()));
        assert_eq!(out.rows.len(), 1);
    }

    #[test]
    fn test_missing_anchor_falls_back_to_text() {
        let registry = StrategyRegistry::with_builtins();
        let dispatcher = Dispatcher::new(&registry, &FakeReader);
        let doc = RawDocument::body("HDFC", "Hello\n12/05/2025 COFFEE SHOP 250.00\n");
        let out = dispatcher.extract_document("hdfc", &doc);
        assert_eq!(out.path, ExtractionPath::Fallback(FallbackMode::Text));
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].amount, 250.0);
    }

    #[test]
    fn test_unregistered_issuer_uses_fallback() {
        let registry = StrategyRegistry::new();
        let dispatcher = Dispatcher::new(&registry, &FakeReader);
        let doc = RawDocument::body("Axis", "12/05/2025 COFFEE SHOP 250.00");
        let out = dispatcher.extract_document("axis", &doc);
        assert_eq!(out.path, ExtractionPath::Fallback(FallbackMode::Text));
    }

    #[test]
    fn test_empty_document_fails() {
        let registry = StrategyRegistry::new();
        let dispatcher = Dispatcher::new(&registry, &FakeReader);
        let out = dispatcher.extract_document("x", &RawDocument::body("x", "  \n "));
        assert!(out.is_failed());
    }

    #[test]
    fn test_first_summary_wins() {
        let registry = StrategyRegistry::new();
        let dispatcher = Dispatcher::new(&registry, &FakeReader);
        let msg = email(
            "Total Amount Due 1,000.00",
            vec![
                ("a.pdf", "Total Amount Due 2,000.00\nPayment Due Date 04/09/2025\n12/08/2025 SHOP ONE 1,000.00"),
                ("b.pdf", "Total Amount Due 3,000.00\nPayment Due Date 05/09/2025"),
            ],
        );
        let parsed = dispatcher.process_email("Axis", "axis", None, &msg);
        let summary = parsed.summary.unwrap();
        assert_eq!(summary.total_amount_due, Some(1000.0));
        // the body had no due date, so the first attachment's fills it
        assert_eq!(summary.payment_due_date, NaiveDate::from_ymd_opt(2025, 9, 4));
        assert_eq!(parsed.due_date, NaiveDate::from_ymd_opt(2025, 9, 4));
        assert_eq!(parsed.transactions.len(), 1);
    }

    #[test]
    fn test_failed_attachment_keeps_siblings() {
        let registry = StrategyRegistry::with_builtins();
        let dispatcher = Dispatcher::new(&registry, &FakeReader);
        let msg = email(
            "",
            vec![
                ("locked.pdf", "LOCKED"),
                ("logo.png", "12/05/2025 NOT A STATEMENT 1.00"),
                ("ok.PDF", "12/05/2025 COFFEE SHOP 250.00\n13/05/2025 BOOK STORE 99.00"),
            ],
        );
        let parsed = dispatcher.process_email("Axis", "axis", Some("wrong"), &msg);
        assert_eq!(parsed.documents.len(), 2);
        assert_eq!(parsed.failed_documents().count(), 1);
        assert_eq!(parsed.transactions.len(), 2);
    }
}
