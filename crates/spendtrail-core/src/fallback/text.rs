//! Unstructured-text fallback
//!
//! Statement text often spreads one transaction over several physical lines
//! (date and time on one, merchant on the next, amount after that). Starting
//! at each line that begins with a date, up to four lines are joined and read
//! as date, description, amount. Summary labels such as `Statement Date
//! 15/06/2025` carry their date at the end and never start a row.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::RawRow;
use crate::normalize::MAX_AMOUNT_DIGITS;

/// Physical lines one logical row may span
const WINDOW_LINES: usize = 4;

/// Shorter descriptions are column noise, not merchants
const MIN_DESCRIPTION_CHARS: usize = 4;

static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{1,2}[ \-][A-Za-z]{3}[ \-]\d{2,4})\b")
        .expect("valid regex")
});

static AMOUNT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d{1,2})?").expect("valid regex"));

static LEADING_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|?\s*\d{1,2}:\d{2}(?::\d{2})?\s*\|?\s*").expect("valid regex"));

/// Credit/debit markers and stray currency glyphs left before the amount.
/// Letter markers must stand alone so `LTD` keeps its `D`.
static TRAILING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\s*(\+\s*C|\+|₹)|(?:^|\s+)(Cr|Dr|C|D))\s*$").expect("valid regex")
});

static CREDIT_AFTER_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*cr\b").expect("valid regex"));

/// Raw rows from free text, in order
pub fn scan_text(text: &str) -> Vec<RawRow> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut rows = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if !DATE_TOKEN.is_match(lines[i]) {
            i += 1;
            continue;
        }

        // Stop the window before the next dated line
        let mut end = i + 1;
        while end < lines.len() && end - i < WINDOW_LINES && !DATE_TOKEN.is_match(lines[end]) {
            end += 1;
        }

        // Grow the window one line at a time. The shortest read with a
        // decimal amount wins; a bare integer is only taken when no line
        // in the window offers one.
        let reads: Vec<(RawRow, usize)> = (i + 1..=end)
            .filter_map(|stop| read_window(&lines[i..stop].join(" ")).map(|row| (row, stop)))
            .collect();
        let decimal = reads.iter().position(|(row, _)| row.amount.contains('.'));
        let read = reads.into_iter().nth(decimal.unwrap_or(0));

        match read {
            Some((row, stop)) => {
                rows.push(row);
                i = stop;
            }
            None => i += 1,
        }
    }

    debug!("Text scan found {} rows", rows.len());
    rows
}

fn read_window(joined: &str) -> Option<RawRow> {
    if joined.chars().count() < 10 {
        return None;
    }

    let date = DATE_TOKEN.find(joined)?;
    let after_date = &joined[date.end()..];

    // Last plausible amount, preferring tokens with decimals; long digit runs
    // are card or reference numbers
    let candidates: Vec<_> = AMOUNT_TOKEN
        .find_iter(after_date)
        .filter(|m| {
            let digits = m.as_str().chars().filter(|c| c.is_ascii_digit()).count();
            digits > 0 && digits <= MAX_AMOUNT_DIGITS
        })
        .filter(|m| !is_time_part(after_date, m.start(), m.end()))
        .collect();
    let amount = candidates
        .iter()
        .rev()
        .find(|m| m.as_str().contains('.'))
        .or_else(|| candidates.last())?;

    let head = after_date[..amount.start()].trim_matches(|c: char| c == '|' || c.is_whitespace());
    let mut description = LEADING_TIME.replace(head, "").to_string();

    let mut credit = CREDIT_AFTER_AMOUNT.is_match(&after_date[amount.end()..]);
    while let Some(caps) = TRAILING_MARKER.captures(&description) {
        let marker = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        if marker.starts_with('+') || marker == "cr" {
            credit = true;
        }
        let cut = caps.get(0).map(|m| m.start()).unwrap_or(description.len());
        description.truncate(cut);
    }
    let description = description.split_whitespace().collect::<Vec<_>>().join(" ");

    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        return None;
    }

    Some(RawRow::new(date.as_str(), &description, amount.as_str()).with_credit(credit))
}

/// `14:50` yields two digit runs that are never amounts
fn is_time_part(text: &str, start: usize, end: usize) -> bool {
    text[..start].ends_with(':') || text[end..].starts_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let rows = scan_text("12/05/2025 COFFEE SHOP 250.00");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "12/05/2025");
        assert_eq!(rows[0].description, "COFFEE SHOP");
        assert_eq!(rows[0].amount, "250.00");
        assert!(!rows[0].credit);
    }

    #[test]
    fn test_window_stitches_split_rows() {
        let text = "18/09/2025| 14:50\nMARRIOTT BONVOY HOTEL\nC 12,500.00\n19/09/2025| 09:10\nREFUND UBER\n+ C 300.00";
        let rows = scan_text(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "MARRIOTT BONVOY HOTEL");
        assert_eq!(rows[0].amount, "12,500.00");
        assert!(!rows[0].credit);
        assert_eq!(rows[1].description, "REFUND UBER");
        assert!(rows[1].credit);
    }

    #[test]
    fn test_reference_numbers_are_not_amounts() {
        let rows = scan_text("05/08/2025 ZOMATO 745.00 REF 123456789012345678");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, "745.00");
        assert_eq!(rows[0].description, "ZOMATO");
    }

    #[test]
    fn test_integer_in_description_is_not_the_amount() {
        let rows = scan_text("12/05/2025 STARBUCKS 42 MG ROAD\n250.00\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "STARBUCKS 42 MG ROAD");
        assert_eq!(rows[0].amount, "250.00");

        let rows = scan_text("05/06/2025 GATE 7 PARKING 120.50\n06/06/2025 METRO CARD 200");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "GATE 7 PARKING");
        assert_eq!(rows[0].amount, "120.50");
        assert_eq!(rows[1].description, "METRO CARD");
        assert_eq!(rows[1].amount, "200");
    }

    #[test]
    fn test_letter_suffix_kept() {
        let rows = scan_text("05/08/2025 AMAZON SELLER PVT LTD 1,999.00");
        assert_eq!(rows[0].description, "AMAZON SELLER PVT LTD");
    }

    #[test]
    fn test_trailing_cr() {
        let rows = scan_text("05/08/2025 MERCHANT ADJUSTMENT 99.00 Cr");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].credit);
        assert_eq!(rows[0].description, "MERCHANT ADJUSTMENT");
    }

    #[test]
    fn test_label_dates_do_not_start_rows() {
        let text = "Statement Date 15/06/2025\nTotal Amount Due 300.40\n01/06/2025 SHOP ONE 100.00";
        let rows = scan_text(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "SHOP ONE");
    }

    #[test]
    fn test_short_descriptions_and_undated_lines_skipped() {
        let text = "Opening balance 1,000.00\nno date here 5.00\n05/08/2025 AB 10.00";
        assert!(scan_text(text).is_empty());
    }
}
