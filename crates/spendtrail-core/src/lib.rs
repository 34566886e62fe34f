//! Spendtrail Core Library
//!
//! Credit card statement extraction and reconciliation:
//! - Amount/date normalization
//! - Anchor-based document segmentation
//! - Per-issuer extraction strategies behind a registry
//! - Generic grid/text fallback extraction
//! - Extraction dispatch across email bodies and PDF attachments
//! - Deduplicating SQLite storage with monthly reconciliation
//! - CSV export

pub mod config;
pub mod db;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod export;
pub mod fallback;
pub mod ingest;
pub mod mailbox;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod segment;
pub mod strategy;
pub mod summary;

pub use config::{default_config_path, AppConfig, DatabaseConfig, IssuerConfig};
pub use db::{Database, PurgeCounts};
pub use dispatch::{DocumentExtraction, DocumentStage, Dispatcher, ExtractionPath, ParsedStatement};
pub use document::{DocumentReader, PdfTextReader};
pub use error::{Error, Result};
pub use export::{write_transactions_csv, TransactionExportOptions};
pub use fallback::{extract_generic, FallbackMode};
pub use ingest::{ingest, reconcile, SourceMessage, VERIFY_TOLERANCE};
pub use mailbox::{load_mailbox, MailboxMessage};
pub use models::*;
pub use normalize::{normalize_amount, normalize_date};
pub use pipeline::{Categorizer, IssuerRunStats, Pipeline};
pub use strategy::{LayoutSpec, LayoutStrategy, ScanContext, Strategy, StrategyRegistry};
