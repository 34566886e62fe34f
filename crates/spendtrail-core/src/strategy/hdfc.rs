//! HDFC credit card statements
//!
//! Rows look like:
//!   19/10/2025| 00:57 SWIGGY BANGALORE + 12 C 1,234.00 l
//!   26/09/2025 | 13:33 NETFLIX USD 10.00 C 899.00
//!   02/10/2025| 11:15 REFUND AMAZON + C 499.00
//!
//! `C` is the rupee glyph as the text layer renders it, `+` before it marks a
//! credit, and a signed integer before that is the reward points column.

use std::ops::Range;

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::models::RawRow;
use crate::segment::{find_all_segments, SegmentAnchors};

use super::rows::RowAccumulator;
use super::{ScanContext, Strategy};

const START_ANCHORS: &[&str] = &["Domestic Transactions", "International Transactions"];

const END_ANCHORS: &[&str] = &[
    "Rewards Program Points Summary",
    "GST Summary",
    "Past Dues",
    "Offers on your card",
    "Eligible for EMI",
    "*Transaction time",
];

/// Standalone glyphs the text layer leaves between columns
const SKIPPABLE: &[&str] = &["+", "C", "₹", "l", "●", "•", "Cr"];

/// A dated line may wrap before its amount; give up after this many joins
const MAX_JOINED_LINES: usize = 3;

pub struct HdfcStrategy {
    anchors: SegmentAnchors,
    row_re: Regex,
    date_start_re: Regex,
    page_noise_re: Regex,
}

impl HdfcStrategy {
    pub fn new() -> Self {
        Self {
            anchors: SegmentAnchors::new(START_ANCHORS, END_ANCHORS),
            row_re: Regex::new(concat!(
                r"^(?P<date>\d{2}/\d{2}/\d{4})",
                r"(?:\s*\|?\s*\d{1,2}:\d{2}(?::\d{2})?)?\s+",
                r"(?P<desc>.+?)",
                r"(?:\s+(?P<points>[+-]\s?\d+))?",
                r"(?:\s+(?P<credit>\+))?",
                r"\s+(?:C\s+|₹\s*)?(?P<amount>[\d,]+\.\d{2})",
                r"(?:\s*(?P<cr>Cr))?\s*l?\s*$"
            ))
            .expect("valid regex"),
            date_start_re: Regex::new(r"^\d{2}/\d{2}/\d{4}").expect("valid regex"),
            page_noise_re: Regex::new(
                r"(?i)^(page \d+ of \d+|hsn code:.*|hdfc bank credit cards gstin:.*|.*credit card statement|date\s*(&|and)?\s*time\s+transaction description.*)$",
            )
            .expect("valid regex"),
        }
    }
}

impl Default for HdfcStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for HdfcStrategy {
    fn key(&self) -> &str {
        "hdfc"
    }

    fn segment(&self, lines: &[&str]) -> Result<Vec<Range<usize>>> {
        find_all_segments(lines, &self.anchors, self.key())
    }

    fn scan_rows(&self, lines: &[&str], _ctx: &ScanContext) -> Vec<RawRow> {
        let mut acc = RowAccumulator::new();
        // Dated line still waiting for its amount, and how many lines it spans
        let mut pending: Option<(String, usize)> = None;

        for line in lines {
            let line = line.trim();
            if line.is_empty() || SKIPPABLE.contains(&line) || self.page_noise_re.is_match(line) {
                continue;
            }

            let (candidate, joined) = match pending.take() {
                Some((head, n)) if !self.date_start_re.is_match(line) => {
                    (format!("{} {}", head, line), n + 1)
                }
                Some((head, _)) => {
                    debug!("hdfc: dropping incomplete row '{}'", head);
                    (line.to_string(), 1)
                }
                None => (line.to_string(), 1),
            };

            if let Some(caps) = self.row_re.captures(&candidate) {
                let credit = caps.name("credit").is_some() || caps.name("cr").is_some();
                acc.push(
                    RawRow::new(&caps["date"], &caps["desc"], &caps["amount"])
                        .with_credit(credit)
                        .with_points(caps.name("points").map(|m| m.as_str())),
                );
            } else if self.date_start_re.is_match(&candidate) {
                if joined < MAX_JOINED_LINES {
                    pending = Some((candidate, joined));
                } else {
                    debug!("hdfc: dropping incomplete row '{}'", candidate);
                }
            } else if !acc.continue_last(&candidate) {
                debug!("hdfc: unmatched line '{}'", candidate);
            }
        }

        if let Some((head, _)) = pending {
            debug!("hdfc: dropping incomplete row '{}'", head);
        }

        acc.finish()
    }
}
