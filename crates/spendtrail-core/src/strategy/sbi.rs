//! SBI Card statements
//!
//! Rows are `DD Mon YY  DESCRIPTION  AMOUNT C|D` between a
//! `TRANSACTIONS FOR <cardholder>` heading and the reward summary or notes.
//! Add-on cards repeat the heading, so every anchored section is scanned.

use std::ops::Range;

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::models::{RawRow, StatementSummary};
use crate::normalize::normalize_amount;
use crate::segment::{find_all_segments, SegmentAnchors};
use crate::summary;

use super::rows::RowAccumulator;
use super::{ScanContext, Strategy};

const START_ANCHORS: &[&str] = &["TRANSACTIONS FOR"];

const END_ANCHORS: &[&str] = &[
    "REWARD SUMMARY",
    "REWARD POINTS SUMMARY",
    "IMPORTANT NOTES",
    "*** End of Statement ***",
];

pub struct SbiStrategy {
    anchors: SegmentAnchors,
    row_re: Regex,
    inline_total_re: Regex,
    total_label_re: Regex,
    amount_token_re: Regex,
}

impl SbiStrategy {
    pub fn new() -> Self {
        Self {
            anchors: SegmentAnchors::new(START_ANCHORS, END_ANCHORS),
            row_re: Regex::new(concat!(
                r"^(?P<date>\d{2} [A-Za-z]{3} \d{2})\s+",
                r"(?P<desc>.+?)\s+",
                r"(?P<amount>[\d,]+\.\d{2})\s*",
                r"(?P<flag>[CD])?$"
            ))
            .expect("valid regex"),
            inline_total_re: Regex::new(
                r"(?i)total\s+amount\s+due[^\d\n]*?((?:rs\.?|₹)?[ \t]*[\d,]+\.\d{2})",
            )
            .expect("valid regex"),
            total_label_re: Regex::new(r"(?i)total\s+amount\s+due").expect("valid regex"),
            amount_token_re: Regex::new(r"[\d,]+\.\d{2}").expect("valid regex"),
        }
    }

    /// `Total Amount Due ... 12,345.00` on one line
    fn total_inline(&self, text: &str) -> Option<f64> {
        self.inline_total_re
            .captures(text)
            .and_then(|caps| normalize_amount(&caps[1]).ok())
    }

    /// A label row naming `Total Amount Due` followed by a row of values; the
    /// total is the last value on that row
    fn total_from_value_row(&self, text: &str) -> Option<f64> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let label = lines.iter().position(|l| self.total_label_re.is_match(l))?;
        let values = lines[label + 1..].iter().find(|l| !l.is_empty())?;
        let last = self.amount_token_re.find_iter(values).last()?;
        normalize_amount(last.as_str()).ok()
    }
}

impl Default for SbiStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SbiStrategy {
    fn key(&self) -> &str {
        "sbi"
    }

    fn segment(&self, lines: &[&str]) -> Result<Vec<Range<usize>>> {
        find_all_segments(lines, &self.anchors, self.key())
    }

    fn scan_rows(&self, lines: &[&str], _ctx: &ScanContext) -> Vec<RawRow> {
        let mut acc = RowAccumulator::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(caps) = self.row_re.captures(line) {
                let credit = caps.name("flag").is_some_and(|f| f.as_str() == "C");
                acc.push(
                    RawRow::new(&caps["date"], &caps["desc"], &caps["amount"]).with_credit(credit),
                );
            } else if !acc.continue_last(line) {
                debug!("sbi: unmatched line '{}'", line);
            }
        }

        acc.finish()
    }

    /// Two layouts print the total differently; the inline form is tried
    /// first, then the label/value row pair, then the generic labels
    fn extract_summary(&self, text: &str) -> Option<StatementSummary> {
        let attempts: [(&str, &dyn Fn(&str) -> Option<f64>); 3] = [
            ("inline", &|t: &str| self.total_inline(t)),
            ("value row", &|t: &str| self.total_from_value_row(t)),
            ("generic", &summary::extract_total_due),
        ];

        let (source, total) = attempts
            .iter()
            .find_map(|(name, attempt)| attempt(text).map(|total| (*name, total)))?;
        debug!("sbi: total amount due {} from {} layout", total, source);

        Some(StatementSummary {
            total_amount_due: Some(total),
            minimum_amount_due: summary::extract_minimum_due(text),
            payment_due_date: summary::extract_due_date(text),
            statement_period: summary::extract_statement_period(text),
        })
    }
}
