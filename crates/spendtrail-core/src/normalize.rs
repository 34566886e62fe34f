//! Amount and date normalization
//!
//! Pure functions that turn locale-specific statement tokens into signed
//! amounts and calendar dates. Every failure carries the offending token so
//! the caller can log it and drop the row.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};

/// Tokens with more digits than this are reference numbers, not amounts
pub const MAX_AMOUNT_DIGITS: usize = 9;

/// Length cap for the merchant label derived from a description
pub const MERCHANT_MAX_CHARS: usize = 50;

const PAYMENT_MARKERS: &[&str] = &[
    "payment received",
    "bill payment",
    "credit card payment",
    "payment - thank you",
    "payment thank you",
];

const REFUND_MARKERS: &[&str] = &["refund", "reversal", "cashback"];

/// Formats tried when the token carries a four digit year
const FULL_YEAR_FORMATS: &[&str] = &[
    "%d/%m/%Y",  // 08/07/2025 (day first)
    "%d-%m-%Y",  // 08-07-2025
    "%m/%d/%Y",  // 07/28/2025 (month first, only when day first fails)
    "%m-%d-%Y",  // 07-28-2025
    "%Y-%m-%d",  // 2025-07-08
    "%Y/%m/%d",  // 2025/07/08
    "%d %B %Y",  // 18 Sep 2025, 18 September 2025
    "%d %B, %Y", // 18 Sep, 2025
    "%d-%B-%Y",  // 31-Dec-2024
    "%B %d, %Y", // Sep 18, 2025
    "%B %d %Y",  // Sep 18 2025
];

/// Formats tried when the year is two digits
const SHORT_YEAR_FORMATS: &[&str] = &[
    "%d/%m/%y",  // 08/07/25
    "%d-%m-%y",  // 08-07-25
    "%m/%d/%y",  // 07/28/25
    "%m-%d-%y",  // 07-28-25
    "%d %B %y",  // 18 Sep 25
    "%d %B, %y", // 18 Sep, 25
    "%d-%B-%y",  // 31-Dec-24
    "%B %d, %y", // Sep 18, 25
];

static FOUR_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("valid regex"));

/// Parse a statement amount token into a signed value.
///
/// A leading `-`, enclosing parentheses or a trailing `Cr` make the value
/// negative. A trailing `Dr` (or no marker) leaves it positive.
pub fn normalize_amount(token: &str) -> Result<f64> {
    let fail = || Error::AmountParse(token.to_string());

    let mut s = token.trim().to_lowercase();
    let mut negative = false;

    if let Some(rest) = s.strip_suffix("cr") {
        negative = true;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_suffix("dr") {
        s = rest.to_string();
    }

    for symbol in ["rs.", "rs", "inr", "usd"] {
        s = s.replace(symbol, "");
    }
    let s: String = s
        .chars()
        .filter(|c| !matches!(c, '₹' | '$' | '€' | '£' | ',') && !c.is_whitespace())
        .collect();

    let mut body = s.as_str();
    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        negative = true;
        body = inner;
    }
    if let Some(rest) = body.strip_prefix('-') {
        negative = true;
        body = rest;
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest;
    }

    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > MAX_AMOUNT_DIGITS {
        return Err(fail());
    }
    if body.chars().any(|c| !c.is_ascii_digit() && c != '.') || body.matches('.').count() > 1 {
        return Err(fail());
    }

    let value: f64 = body.parse().map_err(|_| fail())?;
    if !value.is_finite() {
        return Err(fail());
    }

    Ok(if negative { -value } else { value })
}

/// Parse a statement date token.
///
/// Day-first forms are tried before month-first, so `08/07/2025` is the 8th
/// of July. An unparseable token is an error; no date is ever substituted.
pub fn normalize_date(token: &str) -> Result<NaiveDate> {
    let cleaned = token.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = cleaned.trim_end_matches([',', '.']);

    let formats = if FOUR_DIGITS.is_match(cleaned) {
        FULL_YEAR_FORMATS
    } else {
        SHORT_YEAR_FORMATS
    };

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, fmt) {
            return Ok(date);
        }
    }

    Err(Error::DateParse(token.to_string()))
}

/// Card repayments, which would double count against the statement total
pub fn is_payment_row(description: &str) -> bool {
    let lower = description.to_lowercase();
    PAYMENT_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn is_refund(description: &str) -> bool {
    let lower = description.to_lowercase();
    REFUND_MARKERS.iter().any(|m| lower.contains(m))
}

/// Bounded-length merchant label taken from the start of the description
pub fn derive_merchant(description: &str) -> String {
    description
        .trim()
        .chars()
        .take(MERCHANT_MAX_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Parse a loyalty points token such as `+ 12`, `-4` or `1,250`
pub fn parse_points(token: &str) -> Option<f64> {
    let cleaned: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '+')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_amount_plain_and_grouped() {
        assert_eq!(normalize_amount("250.00").unwrap(), 250.0);
        assert_eq!(normalize_amount("1,23,456.78").unwrap(), 123456.78);
        assert_eq!(normalize_amount(" ₹ 1,000.50 ").unwrap(), 1000.5);
        assert_eq!(normalize_amount("Rs. 99").unwrap(), 99.0);
        assert_eq!(normalize_amount("$12.34").unwrap(), 12.34);
    }

    #[test]
    fn test_amount_credit_markers() {
        assert_eq!(normalize_amount("-45.10").unwrap(), -45.1);
        assert_eq!(normalize_amount("(45.10)").unwrap(), -45.1);
        assert_eq!(normalize_amount("1,200.00 Cr").unwrap(), -1200.0);
        assert_eq!(normalize_amount("1,200.00CR").unwrap(), -1200.0);
        assert_eq!(normalize_amount("1,200.00 Dr").unwrap(), 1200.0);
        assert_eq!(normalize_amount("-₹500").unwrap(), -500.0);
    }

    #[test]
    fn test_amount_rejects_reference_numbers() {
        assert!(matches!(
            normalize_amount("123456789012345678"),
            Err(Error::AmountParse(_))
        ));
        assert!(normalize_amount("1234567890").is_err());
        assert!(normalize_amount("1,234,567.89").is_ok());
    }

    #[test]
    fn test_amount_rejects_garbage() {
        assert!(normalize_amount("").is_err());
        assert!(normalize_amount("₹").is_err());
        assert!(normalize_amount("12a4").is_err());
        assert!(normalize_amount("1.2.3").is_err());
        assert!(normalize_amount("Cr").is_err());
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(normalize_date("18 Sep 25").unwrap(), date(2025, 9, 18));
        assert_eq!(normalize_date("31-Dec-2024").unwrap(), date(2024, 12, 31));
        assert_eq!(normalize_date("08/07/2025").unwrap(), date(2025, 7, 8));
        assert_eq!(normalize_date("2025-07-08").unwrap(), date(2025, 7, 8));
        assert_eq!(normalize_date("18 September 2025").unwrap(), date(2025, 9, 18));
        assert_eq!(normalize_date("Sep 18, 2025").unwrap(), date(2025, 9, 18));
        assert_eq!(normalize_date("31-Dec-24").unwrap(), date(2024, 12, 31));
    }

    #[test]
    fn test_full_month_names() {
        assert_eq!(normalize_date("September 18, 2025").unwrap(), date(2025, 9, 18));
        assert_eq!(normalize_date("18 September, 2025").unwrap(), date(2025, 9, 18));
        assert_eq!(normalize_date("August 17 2025").unwrap(), date(2025, 8, 17));
        assert_eq!(normalize_date("1 March 25").unwrap(), date(2025, 3, 1));
        assert_eq!(normalize_date("31-December-2024").unwrap(), date(2024, 12, 31));
    }

    #[test]
    fn test_date_month_first_only_when_day_first_fails() {
        assert_eq!(normalize_date("07/28/2025").unwrap(), date(2025, 7, 28));
        assert_eq!(normalize_date("03/04/2025").unwrap(), date(2025, 4, 3));
    }

    #[test]
    fn test_date_round_trip() {
        use chrono::Datelike;

        let fixed = [date(2025, 9, 18), date(2024, 12, 31), date(2025, 7, 8)];
        for d in fixed {
            for fmt in FULL_YEAR_FORMATS.iter().chain(SHORT_YEAR_FORMATS) {
                // ambiguous month-first tokens belong to day-first
                if fmt.starts_with("%m") && d.day() <= 12 {
                    continue;
                }
                let token = d.format(fmt).to_string();
                assert_eq!(normalize_date(&token).unwrap(), d, "format {fmt}");
            }
        }
    }

    #[test]
    fn test_date_failure_carries_token() {
        match normalize_date("not a date") {
            Err(Error::DateParse(token)) => assert_eq!(token, "not a date"),
            other => panic!("expected DateParse, got {other:?}"),
        }
        assert!(normalize_date("32/01/2025").is_err());
    }

    #[test]
    fn test_payment_and_refund_markers() {
        assert!(is_payment_row("PAYMENT RECEIVED - THANK YOU"));
        assert!(is_payment_row("Bill Payment via NetBanking"));
        assert!(!is_payment_row("AMAZON PAY"));
        assert!(is_refund("Refund - FLIPKART"));
        assert!(is_refund("CASHBACK CREDIT"));
        assert!(!is_refund("SWIGGY"));
    }

    #[test]
    fn test_merchant_is_bounded() {
        let long = "X".repeat(80);
        assert_eq!(derive_merchant(&long).chars().count(), MERCHANT_MAX_CHARS);
        assert_eq!(derive_merchant("  ZOMATO  "), "ZOMATO");
        let multibyte = "₹".repeat(60);
        assert_eq!(derive_merchant(&multibyte).chars().count(), MERCHANT_MAX_CHARS);
    }

    #[test]
    fn test_points() {
        assert_eq!(parse_points("+ 12"), Some(12.0));
        assert_eq!(parse_points("-4"), Some(-4.0));
        assert_eq!(parse_points("1,250"), Some(1250.0));
        assert_eq!(parse_points("abc"), None);
    }
}
