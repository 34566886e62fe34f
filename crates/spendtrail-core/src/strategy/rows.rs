//! Shared row finalisation: raw grammar output to normalized candidates

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{RawRow, TransactionCandidate};
use crate::normalize::{
    derive_merchant, is_payment_row, is_refund, normalize_amount, normalize_date, parse_points,
};

static TRAILING_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d[\d,]*\.\d{2}\s*(?:cr|dr|c|d)?\s*$").expect("valid regex")
});

static LEADING_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d{1,2}[/\-\s](?:\d{1,2}|[A-Za-z]{3})").expect("valid regex")
});

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*page\s+\d+(\s+of\s+\d+)?\s*$").expect("valid regex"));

/// Turn one raw row into a candidate.
///
/// Returns `Ok(None)` for card repayment rows, which are never kept.
pub fn finalize_row(row: &RawRow) -> Result<Option<TransactionCandidate>> {
    if is_payment_row(&row.description) {
        return Ok(None);
    }

    let description = row.description.trim();
    if description.is_empty() {
        return Err(Error::InvalidData(format!(
            "row on {} has no description",
            row.date
        )));
    }

    let transaction_date = normalize_date(&row.date)?;
    let mut amount = normalize_amount(&row.amount)?;

    // Only flip positive values so an already signed amount stays a credit
    if (row.credit || is_refund(description)) && amount > 0.0 {
        amount = -amount;
    }

    Ok(Some(TransactionCandidate {
        transaction_date,
        description: description.to_string(),
        merchant: derive_merchant(description),
        amount,
        points: row.points.as_deref().and_then(parse_points),
        classification: row.classification.clone(),
    }))
}

/// Finalize every row, dropping the ones that fail with a debug log
pub fn finalize_rows(source: &str, rows: Vec<RawRow>) -> Vec<TransactionCandidate> {
    let total = rows.len();
    let mut out = Vec::with_capacity(total);

    for row in rows {
        match finalize_row(&row) {
            Ok(Some(candidate)) => out.push(candidate),
            Ok(None) => debug!("{}: skipping payment row '{}'", source, row.description),
            Err(e) => debug!("{}: dropping row '{}': {}", source, row.description, e),
        }
    }

    debug!("{}: kept {} of {} rows", source, out.len(), total);
    out
}

/// Collects rows in order and stitches overflow lines onto the last row
#[derive(Debug, Default)]
pub struct RowAccumulator {
    rows: Vec<RawRow>,
}

impl RowAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: RawRow) {
        self.rows.push(row);
    }

    /// Append `line` to the previous row's description if it reads as an
    /// overflow line. Returns whether it was taken.
    pub fn continue_last(&mut self, line: &str) -> bool {
        if !is_continuation(line) {
            return false;
        }
        match self.rows.last_mut() {
            Some(last) => {
                last.continue_description(line);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self) -> Vec<RawRow> {
        self.rows
    }
}

/// A line with text, no leading date and no trailing amount
pub fn is_continuation(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.chars().any(|c| c.is_alphabetic())
        && !LEADING_DATE.is_match(line)
        && !TRAILING_AMOUNT.is_match(&line.to_lowercase())
        && !PAGE_MARKER.is_match(line)
}
