//! CLI command tests

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde_json::json;
use spendtrail_core::{
    AppConfig, Database, DocumentReader, ExtractionPath, PdfTextReader, StatementPeriod,
};

use crate::commands::{self, truncate};

/// Treats attachment bytes as the document text
struct PlainTextReader;

impl DocumentReader for PlainTextReader {
    fn read_text(&self, bytes: &[u8], _key: Option<&str>) -> spendtrail_core::Result<String> {
        Ok(String::from_utf8_lossy(bytes).to_string())
    }
}

const SBI_AUGUST: &str = r#"SBI Card Monthly Statement
Statement Date 15 Aug 2025
Total Amount Due ₹ 1,899.50
Payment Due Date 04 Sep 2025
TRANSACTIONS FOR CARDHOLDER
01 Aug 25 AMAZON SELLER SERVICES 1,499.00 D
03 Aug 25 ZOMATO ONLINE ORDER 645.50 D
07 Aug 25 PAYMENT RECEIVED 000IR01 5,000.00 C
09 Aug 25 REFUND FLIPKART 245.00 D
REWARD SUMMARY
"#;

fn config_with_sbi() -> AppConfig {
    AppConfig::from_toml_str(
        r#"
        [[issuers]]
        identity = "SBI"
        subject_filter = "statement"
        "#,
    )
    .unwrap()
}

/// Mailbox with one SBI statement as a PDF attachment and one unrelated message
fn write_mailbox(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("sbi-aug.pdf"), SBI_AUGUST).unwrap();
    let mailbox = dir.join("mailbox.json");
    let messages = json!([
        {
            "issuer": "sbi",
            "id": "<aug@sbicard>",
            "subject": "Your SBI Card Monthly Statement",
            "date": "2025-08-16",
            "attachments": [{ "path": "sbi-aug.pdf", "content_type": "application/pdf" }]
        },
        {
            "issuer": "SBI",
            "id": "<offer@sbicard>",
            "subject": "Exclusive offers for you",
            "body": "01 Aug 25 NOT A STATEMENT 10.00 D"
        }
    ]);
    fs::write(&mailbox, serde_json::to_string_pretty(&messages).unwrap()).unwrap();
    mailbox
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("AMAZON SELLER SERVICES", 10), "AMAZON ...");
    // Multi-byte characters are not split
    assert_eq!(truncate("₹₹₹₹₹₹", 5), "₹₹...");
}

#[test]
fn test_resolve_period() {
    assert_eq!(
        commands::resolve_period(Some(8), Some(2025)).unwrap(),
        StatementPeriod::new(8, 2025)
    );
    assert_eq!(commands::resolve_period(None, None).unwrap(), None);
    assert!(commands::resolve_period(Some(13), Some(2025)).is_err());
    assert!(commands::resolve_period(Some(8), None).is_err());
}

#[test]
fn test_issuer_for_prefers_configured_identity() {
    let config = config_with_sbi();
    assert_eq!(commands::issuer_for(&config, "sbi").identity, "SBI");
    let adhoc = commands::issuer_for(&config, "HDFC");
    assert_eq!(adhoc.identity, "HDFC");
    assert_eq!(adhoc.strategy_key(), "hdfc");
}

#[test]
fn test_file_as_email() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("body.txt");
    fs::write(&text, "hello").unwrap();
    let email = commands::file_as_email(&text).unwrap();
    assert_eq!(email.body_text, "hello");
    assert!(email.attachments.is_empty());

    let pdf = dir.path().join("Statement.PDF");
    fs::write(&pdf, b"%PDF").unwrap();
    let email = commands::file_as_email(&pdf).unwrap();
    assert!(email.body_text.is_empty());
    assert_eq!(email.attachments.len(), 1);
    assert!(email.attachments[0].is_pdf());

    assert!(commands::file_as_email(&dir.path().join("missing.txt")).is_err());
}

// ========== Parse Command Tests ==========

#[test]
fn test_parse_text_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("sbi.txt");
    fs::write(&file, SBI_AUGUST).unwrap();

    let parsed = commands::parse_file(
        &AppConfig::default(),
        &PdfTextReader::new(),
        &file,
        "sbi",
        None,
    )
    .unwrap();

    assert_eq!(parsed.documents.len(), 1);
    assert_eq!(
        parsed.documents[0].path,
        ExtractionPath::Strategy("sbi".to_string())
    );
    let amounts: Vec<f64> = parsed.transactions.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![1499.0, 645.5, -245.0]);
    let summary = parsed.summary.unwrap();
    assert_eq!(summary.total_amount_due, Some(1899.5));
    assert_eq!(summary.statement_period, StatementPeriod::new(8, 2025));
}

#[test]
fn test_cmd_parse_prints() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("sbi.txt");
    fs::write(&file, SBI_AUGUST).unwrap();
    let config = AppConfig::default();

    assert!(commands::cmd_parse(&config, &file, "sbi", None, false).is_ok());
    assert!(commands::cmd_parse(&config, &file, "sbi", None, true).is_ok());
}

// ========== Ingest Command Tests ==========

#[test]
fn test_ingest_mailbox() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = write_mailbox(dir.path());
    let db = Database::in_memory().unwrap();
    let config = config_with_sbi();

    let results = commands::ingest_mailbox(&db, &config, &PlainTextReader, &mailbox).unwrap();
    assert_eq!(results.len(), 1);
    let (issuer, stats) = &results[0];
    assert_eq!(issuer, "SBI");
    assert_eq!(stats.seen, 2);
    assert_eq!(stats.filtered, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.inserted, 3);

    let august = StatementPeriod::new(8, 2025).unwrap();
    assert!(db.is_period_verified("SBI", august).unwrap());

    // Second run finds the message already processed
    let results = commands::ingest_mailbox(&db, &config, &PlainTextReader, &mailbox).unwrap();
    assert_eq!(results[0].1.skipped_processed, 1);
    assert_eq!(results[0].1.inserted, 0);
    assert_eq!(db.count_transactions(Some("SBI")).unwrap(), 3);
}

#[test]
fn test_ingest_missing_mailbox() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::in_memory().unwrap();
    let result = commands::ingest_mailbox(
        &db,
        &AppConfig::default(),
        &PlainTextReader,
        &dir.path().join("nope.json"),
    );
    assert!(result.is_err());
}

// ========== Ledger Command Tests ==========

#[test]
fn test_ledger_commands_after_ingest() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = write_mailbox(dir.path());
    let db = Database::in_memory().unwrap();
    commands::ingest_mailbox(&db, &config_with_sbi(), &PlainTextReader, &mailbox).unwrap();

    assert!(commands::cmd_transactions_list(&db, None, 20).is_ok());
    assert!(commands::cmd_transactions_list(&db, Some("HDFC"), 20).is_ok());
    assert!(commands::cmd_verifications(&db, Some("SBI")).is_ok());

    let today = NaiveDate::from_ymd_opt(2025, 8, 30).unwrap();
    assert_eq!(db.upcoming_due(today, 10).unwrap().len(), 1);
    assert!(commands::cmd_due(&db, today, 10).is_ok());
}

#[test]
fn test_ledger_commands_on_empty_db() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_transactions_list(&db, None, 20).is_ok());
    assert!(commands::cmd_verifications(&db, None).is_ok());
    let today = NaiveDate::from_ymd_opt(2025, 8, 30).unwrap();
    assert!(commands::cmd_due(&db, today, 10).is_ok());
}

// ========== Reset Command Tests ==========

#[test]
fn test_reset_allows_reingest() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = write_mailbox(dir.path());
    let db = Database::in_memory().unwrap();
    let config = config_with_sbi();
    commands::ingest_mailbox(&db, &config, &PlainTextReader, &mailbox).unwrap();

    let august = StatementPeriod::new(8, 2025);
    commands::cmd_reset(&db, "SBI", august, false).unwrap();
    assert!(!db.is_processed("<aug@sbicard>", "SBI").unwrap());
    assert_eq!(db.count_transactions(Some("SBI")).unwrap(), 3);

    // The period is verified, so the message is marked without new rows
    let results = commands::ingest_mailbox(&db, &config, &PlainTextReader, &mailbox).unwrap();
    assert_eq!(results[0].1.skipped_verified, 1);
    assert_eq!(db.count_transactions(Some("SBI")).unwrap(), 3);
}

#[test]
fn test_reset_with_purge() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = write_mailbox(dir.path());
    let db = Database::in_memory().unwrap();
    let config = config_with_sbi();
    commands::ingest_mailbox(&db, &config, &PlainTextReader, &mailbox).unwrap();

    commands::cmd_reset(&db, "SBI", None, true).unwrap();
    assert_eq!(db.count_transactions(Some("SBI")).unwrap(), 0);
    assert!(db.list_verifications(Some("SBI")).unwrap().is_empty());

    let results = commands::ingest_mailbox(&db, &config, &PlainTextReader, &mailbox).unwrap();
    assert_eq!(results[0].1.inserted, 3);
}

// ========== Export Command Tests ==========

#[test]
fn test_export_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = write_mailbox(dir.path());
    let db = Database::in_memory().unwrap();
    commands::ingest_mailbox(&db, &config_with_sbi(), &PlainTextReader, &mailbox).unwrap();

    let out = dir.path().join("out.csv");
    commands::cmd_export(&db, Some("SBI"), Some("2025-08-02"), None, Some(&out)).unwrap();
    let csv = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Date,Issuer,Description,Merchant,Amount,Points,Classification,Category"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("2025-08-03,SBI,ZOMATO ONLINE ORDER"));
    assert!(lines[2].contains("-245.00"));
}

#[test]
fn test_export_rejects_bad_date() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_export(&db, None, Some("08/02/2025"), None, None).is_err());
}

// ========== Init Command Tests ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spendtrail.db");
    commands::cmd_init(&path, &AppConfig::default()).unwrap();
    assert!(path.exists());
}
