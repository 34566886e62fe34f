//! Anchor-and-pattern layouts
//!
//! A layout is the simplest kind of strategy: literal section anchors plus one
//! row regex with named groups `date`, `desc` and `amount` (and optionally
//! `points`, `category` and `credit`). Issuers defined in the config file use
//! this, and so does the built-in `icici` layout.

use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::RawRow;
use crate::segment::{find_all_segments, SegmentAnchors};

use super::rows::RowAccumulator;
use super::{ScanContext, Strategy};

/// Declarative description of a layout, as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSpec {
    pub start_anchors: Vec<String>,
    pub end_anchors: Vec<String>,
    pub row_pattern: String,
    /// Text that marks a row as a credit wherever it appears in the row
    #[serde(default)]
    pub credit_markers: Vec<String>,
}

pub struct LayoutStrategy {
    key: String,
    anchors: SegmentAnchors,
    row_re: Regex,
    credit_markers: Vec<String>,
}

impl LayoutStrategy {
    pub fn new(key: &str, spec: &LayoutSpec) -> Result<Self> {
        if spec.start_anchors.is_empty() {
            return Err(Error::Config(format!(
                "layout '{}' needs at least one start anchor",
                key
            )));
        }

        let row_re = Regex::new(&spec.row_pattern)?;
        for group in ["date", "desc", "amount"] {
            if !row_re.capture_names().flatten().any(|n| n == group) {
                return Err(Error::Config(format!(
                    "layout '{}' row pattern has no '{}' group",
                    key, group
                )));
            }
        }

        Ok(Self {
            key: key.to_lowercase(),
            anchors: SegmentAnchors::new(&spec.start_anchors, &spec.end_anchors),
            row_re,
            credit_markers: spec
                .credit_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        })
    }

    fn is_credit(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.credit_markers.iter().any(|m| lower.contains(m))
    }
}

impl Strategy for LayoutStrategy {
    fn key(&self) -> &str {
        &self.key
    }

    fn segment(&self, lines: &[&str]) -> Result<Vec<Range<usize>>> {
        find_all_segments(lines, &self.anchors, &self.key)
    }

    fn scan_rows(&self, lines: &[&str], _ctx: &ScanContext) -> Vec<RawRow> {
        let mut acc = RowAccumulator::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = self.row_re.captures(line) {
                let credit = caps.name("credit").is_some_and(|m| !m.as_str().is_empty())
                    || self.is_credit(line);
                acc.push(
                    RawRow::new(&caps["date"], &caps["desc"], &caps["amount"])
                        .with_credit(credit)
                        .with_points(caps.name("points").map(|m| m.as_str()))
                        .with_classification(caps.name("category").map(|m| m.as_str())),
                );
            } else if !acc.continue_last(line) {
                debug!("{}: unmatched line '{}'", self.key, line);
            }
        }

        acc.finish()
    }
}

/// ICICI Bank statements: `DD/MM/YYYY  SerNo  Description  Points  Amount [CR]`
pub(super) fn icici() -> LayoutStrategy {
    let spec = LayoutSpec {
        start_anchors: vec!["Transaction Details".into()],
        end_anchors: vec![
            "Great offers on your card".into(),
            "Important Messages".into(),
            "Safe Banking Tips".into(),
        ],
        row_pattern: concat!(
            r"^(?P<date>\d{2}/\d{2}/\d{4})\s+",
            r"(?:\d{8,12}\s+)?",
            r"(?P<desc>.+?)\s+",
            r"(?:(?P<points>-?\d+)\s+)?",
            r"(?P<amount>[\d,]+\.\d{2})",
            r"(?:\s*(?P<credit>CR))?\s*$"
        )
        .into(),
        credit_markers: vec![],
    };
    LayoutStrategy::new("icici", &spec).expect("valid layout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn extract(strategy: &LayoutStrategy, text: &str) -> Vec<crate::models::TransactionCandidate> {
        let lines: Vec<&str> = text.lines().collect();
        let ctx = ScanContext::default();
        strategy
            .segment(&lines)
            .unwrap()
            .into_iter()
            .flat_map(|r| strategy.extract_rows(&lines[r], &ctx))
            .collect()
    }

    #[test]
    fn test_icici_rows() {
        let text = r#"
Statement period : July 18, 2025 to August 17, 2025
Transaction Details
Date SerNo. Transaction Details Reward Points Intl.# amount Amount (in`)
20/07/2025 11223344556 IND*AMAZON HTTP://WWW.AM 24 1,234.00
22/07/2025 11223344557 BBPS PAYMENT RECEIVED 0 5,000.00 CR
25/07/2025 11223344558 UBER INDIA 3 180.00
26/07/2025 11223344559 MYNTRA REFUND 0 799.00 CR
Great offers on your card
"#;
        let rows = extract(&icici(), text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].description, "IND*AMAZON HTTP://WWW.AM");
        assert_eq!(rows[0].points, Some(24.0));
        assert_eq!(rows[0].amount, 1234.0);
        assert_eq!(rows[1].description, "UBER INDIA");
        assert_eq!(
            rows[2].transaction_date,
            NaiveDate::from_ymd_opt(2025, 7, 26).unwrap()
        );
        assert_eq!(rows[2].amount, -799.0);
    }

    #[test]
    fn test_config_layout_with_markers() {
        let spec = LayoutSpec {
            start_anchors: vec!["ACTIVITY".into()],
            end_anchors: vec!["END".into()],
            row_pattern: r"^(?P<date>\d{4}-\d{2}-\d{2})\s+(?P<desc>.+?)\s+(?P<category>\[\w+\])?\s*(?P<amount>[\d.]+)$".into(),
            credit_markers: vec!["(adj)".into()],
        };
        let strategy = LayoutStrategy::new("Kotak", &spec).unwrap();
        assert_eq!(strategy.key(), "kotak");

        let rows = extract(
            &strategy,
            "ACTIVITY\n2025-03-01 GROCER [Food] 12.50\n2025-03-02 FEE WAIVER (adj) 5.00\nEND",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].classification.as_deref(), Some("[Food]"));
        assert_eq!(rows[1].amount, -5.0);
    }

    #[test]
    fn test_invalid_layouts() {
        let mut spec = LayoutSpec {
            start_anchors: vec![],
            end_anchors: vec![],
            row_pattern: r"(?P<date>x)(?P<desc>y)(?P<amount>z)".into(),
            credit_markers: vec![],
        };
        assert!(matches!(LayoutStrategy::new("a", &spec), Err(Error::Config(_))));

        spec.start_anchors = vec!["START".into()];
        spec.row_pattern = r"(?P<date>x)(?P<desc>y)".into();
        assert!(matches!(LayoutStrategy::new("a", &spec), Err(Error::Config(_))));

        spec.row_pattern = r"(?P<date>x".into();
        assert!(matches!(LayoutStrategy::new("a", &spec), Err(Error::Regex(_))));
    }
}
