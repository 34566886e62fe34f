//! American Express activity exports
//!
//! The copied activity page has no table. Each transaction is a block of
//! lines opened by a date line:
//!
//! ```text
//! 18 Nov PAYU SWIGGY
//! SWIGGY BANGALORE
//! Will appear on your Dec statement
//! ₹ 412.00
//! ```
//!
//! Dates usually carry no year; it is taken from the statement period.

use std::ops::Range;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{RawRow, StatementPeriod};
use crate::normalize::is_payment_row;

use super::{ScanContext, Strategy};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Page furniture that never belongs to a transaction block
const NOISE_PREFIXES: &[&str] = &[
    "Card Activity from",
    "DATE DESCRIPTION AMOUNT",
    "ACCOUNT ENDING -",
    "American Express",
    "Summary",
    "Payments & Credits",
    "New Charges",
    "Total ",
];

pub struct AmexStrategy {
    inline_date_re: Regex,
    dash_date_re: Regex,
    amount_re: Regex,
}

impl AmexStrategy {
    pub fn new() -> Self {
        Self {
            inline_date_re: Regex::new(r"^(\d{1,2}\s+[A-Za-z]{3})\b(.*)$").expect("valid regex"),
            dash_date_re: Regex::new(r"^(\d{1,2}-[A-Za-z]{3})-(\d{4})?\s*$").expect("valid regex"),
            amount_re: Regex::new(r"(-?)₹\s*([\d,]+(?:\.\d+)?)").expect("valid regex"),
        }
    }

    fn is_date_line(&self, line: &str) -> bool {
        self.inline_date_re.is_match(line) || self.dash_date_re.is_match(line)
    }

    fn is_noise(line: &str) -> bool {
        NOISE_PREFIXES.iter().any(|p| line.starts_with(p))
            || (line.starts_with("Transactions ") && !line.contains('₹'))
            || line.contains("activity/search?")
    }

    fn split_blocks<'a>(&self, lines: &[&'a str]) -> Vec<Vec<&'a str>> {
        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() || Self::is_noise(line) {
                continue;
            }
            if self.is_date_line(line) {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                current.push(line);
            } else if !current.is_empty() {
                current.push(line);
            }
        }
        if !current.is_empty() {
            blocks.push(current);
        }

        blocks
    }

    fn parse_block(&self, block: &[&str], ctx: &ScanContext) -> Option<RawRow> {
        let first = *block.first()?;
        let mut idx;
        let date;
        let mut name = String::new();

        if let Some(caps) = self.dash_date_re.captures(first) {
            let base = caps[1].to_string();
            match caps.get(2) {
                Some(year) => {
                    date = format!("{}-{}", base, year.as_str());
                    idx = 1;
                }
                None if block.get(1).is_some_and(|l| is_year(l)) => {
                    date = format!("{}-{}", base, block[1]);
                    idx = 2;
                }
                None => {
                    date = resolve_year(&base.replace('-', " "), ctx.statement_period);
                    idx = 1;
                }
            }
        } else {
            let caps = self.inline_date_re.captures(first)?;
            date = resolve_year(&caps[1], ctx.statement_period);
            name = caps[2].trim().to_string();
            idx = 1;
        }

        let credit = block.iter().skip(1).any(|l| l.eq_ignore_ascii_case("credit"));
        if name.is_empty() {
            while block.get(idx).is_some_and(|l| l.eq_ignore_ascii_case("credit")) {
                idx += 1;
            }
            name = block.get(idx).map(|l| l.to_string()).unwrap_or_default();
            idx += 1;
        }

        // The line before "Will appear on your ..." is the fuller description
        let mut description = name.clone();
        if let Some(marker) = (idx..block.len()).find(|&i| block[i].contains("Will appear on your")) {
            if marker > idx {
                description = block[marker - 1].to_string();
            }
        }

        if is_payment_row(&name) || is_payment_row(&description) {
            debug!("amex: skipping payment block '{}'", name);
            return None;
        }

        let amount_line = block.iter().rev().find(|l| l.contains('₹'))?;
        let caps = self.amount_re.captures(amount_line)?;
        let amount = format!("{}{}", &caps[1], &caps[2]);

        Some(RawRow::new(&date, &description, &amount).with_credit(credit))
    }
}

impl Default for AmexStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for AmexStrategy {
    fn key(&self) -> &str {
        "amex"
    }

    /// The whole export is the transaction section once it has a date line
    fn segment(&self, lines: &[&str]) -> Result<Vec<Range<usize>>> {
        if lines.iter().any(|l| self.is_date_line(l.trim())) {
            Ok(vec![0..lines.len()])
        } else {
            Err(Error::SegmentNotFound(self.key().to_string()))
        }
    }

    fn scan_rows(&self, lines: &[&str], ctx: &ScanContext) -> Vec<RawRow> {
        let blocks = self.split_blocks(lines);
        let total = blocks.len();
        let rows: Vec<RawRow> = blocks
            .iter()
            .filter_map(|block| {
                let row = self.parse_block(block, ctx);
                if row.is_none() {
                    debug!("amex: skipped block starting '{}'", block[0]);
                }
                row
            })
            .collect();
        debug!("amex: {} rows from {} blocks", rows.len(), total);
        rows
    }
}

fn is_year(line: &str) -> bool {
    line.len() == 4 && line.chars().all(|c| c.is_ascii_digit())
}

fn month_number(abbr: &str) -> Option<u32> {
    let lower = abbr.to_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u32 + 1)
}

/// Give a `DD Mon` date the year of the statement it belongs to.
///
/// Months after the statement month belong to the previous year. Without a
/// period the token is returned unchanged and fails date parsing later.
fn resolve_year(day_month: &str, period: Option<StatementPeriod>) -> String {
    let day_month = day_month.split_whitespace().collect::<Vec<_>>().join(" ");
    let (Some(period), Some(month)) = (
        period,
        day_month.split(' ').nth(1).and_then(month_number),
    ) else {
        return day_month;
    };

    let year = if month > period.month {
        period.year - 1
    } else {
        period.year
    };
    format!("{} {}", day_month, year)
}
