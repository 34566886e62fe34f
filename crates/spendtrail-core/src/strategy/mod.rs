//! Per-issuer extraction strategies
//!
//! Each issuer layout is a [`Strategy`] registered under a lower-case key.
//! The dispatcher looks strategies up by key and never inspects issuer names.
//!
//! Built-ins:
//! - `hdfc` - date/time rows, reward points, domestic and international sections
//! - `sbi` - `DD Mon YY` rows with a trailing C/D flag
//! - `amex` - block-structured activity exports with rupee amount lines
//! - `icici` - a [`LayoutStrategy`] (anchors plus one row pattern)

mod amex;
mod hdfc;
mod layout;
pub mod rows;
mod sbi;

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::Result;
use crate::models::{RawRow, StatementPeriod, StatementSummary, TransactionCandidate};
use crate::summary;

pub use amex::AmexStrategy;
pub use hdfc::HdfcStrategy;
pub use layout::{LayoutSpec, LayoutStrategy};
pub use rows::{finalize_row, finalize_rows, RowAccumulator};
pub use sbi::SbiStrategy;

/// Document-level facts a grammar may need while reading rows
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanContext {
    /// Used to place year-less row dates
    pub statement_period: Option<StatementPeriod>,
}

/// An issuer-specific segmentation and extraction contract
pub trait Strategy: Send + Sync {
    /// Registry key (lower case)
    fn key(&self) -> &str;

    /// Line ranges holding itemised transactions.
    ///
    /// Fails with `SegmentNotFound` when the start anchor is absent.
    fn segment(&self, lines: &[&str]) -> Result<Vec<Range<usize>>>;

    /// Raw rows from the segmented lines, in document order
    fn scan_rows(&self, lines: &[&str], ctx: &ScanContext) -> Vec<RawRow>;

    /// Normalized candidates. Never fails: an unmatched segment is an empty list.
    fn extract_rows(&self, lines: &[&str], ctx: &ScanContext) -> Vec<TransactionCandidate> {
        finalize_rows(self.key(), self.scan_rows(lines, ctx))
    }

    fn extract_summary(&self, text: &str) -> Option<StatementSummary> {
        summary::extract_summary(text)
    }

    fn extract_due_date(&self, text: &str) -> Option<NaiveDate> {
        summary::extract_due_date(text)
    }
}

/// Mapping from issuer key to strategy
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Empty registry; every document goes straight to the generic fallback
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(HdfcStrategy::new()));
        registry.register(Box::new(SbiStrategy::new()));
        registry.register(Box::new(AmexStrategy::new()));
        registry.register(Box::new(layout::icici()));
        registry
    }

    /// Add a strategy, replacing any existing one with the same key
    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        let key = strategy.key().to_lowercase();
        if self.strategies.insert(key.clone(), strategy).is_some() {
            debug!("Replaced strategy '{}'", key);
        } else {
            debug!("Registered strategy '{}'", key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&dyn Strategy> {
        self.strategies
            .get(&key.trim().to_lowercase())
            .map(|s| s.as_ref())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("keys", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentAnchors;

    struct Fixed;

    impl Strategy for Fixed {
        fn key(&self) -> &str {
            "HDFC"
        }

        fn segment(&self, lines: &[&str]) -> Result<Vec<Range<usize>>> {
            Ok(vec![crate::segment::find_segment(
                lines,
                &SegmentAnchors::new(&["start"], &["end"]),
                self.key(),
            )?])
        }

        fn scan_rows(&self, _lines: &[&str], _ctx: &ScanContext) -> Vec<RawRow> {
            vec![RawRow::new("01/01/2025", "FIXED", "1.00")]
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = StrategyRegistry::with_builtins();
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(keys, vec!["amex", "hdfc", "icici", "sbi"]);
    }

    #[test]
    fn test_lookup_is_exact_on_lowercase_key() {
        let registry = StrategyRegistry::with_builtins();
        assert!(registry.get("HDFC").is_some());
        assert!(registry.get(" sbi ").is_some());
        assert!(registry.get("HDFC Regalia Gold").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = StrategyRegistry::with_builtins();
        registry.register(Box::new(Fixed));
        let hdfc = registry.get("hdfc").unwrap();
        let rows = hdfc.extract_rows(&[], &ScanContext::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "FIXED");
        assert_eq!(registry.keys().count(), 4);
    }
}
