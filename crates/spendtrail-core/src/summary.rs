//! Statement metadata: amount due, due date and statement period

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{StatementPeriod, StatementSummary};
use crate::normalize::{normalize_amount, normalize_date};

/// Date shapes seen next to summary labels
const DATE: &str = concat!(
    r"(?:\d{1,2}[/-]\d{1,2}[/-]\d{2,4}",
    r"|\d{4}-\d{2}-\d{2}",
    r"|\d{1,2}[ \-][A-Za-z]{3,9}[ ,\-]+\d{2,4}",
    r"|[A-Za-z]{3,9} \d{1,2},? \d{4})"
);

const AMOUNT: &str = r"(?:rs\.?|inr|usd|₹|\$)?\s*([\d,]+(?:\.\d{1,2})?)";

static TOTAL_DUE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(&format!(
            r"(?i)(?:total\s+amount\s+due|total\s+dues?|amount\s+due|total\s+outstanding|outstanding|closing\s+balance)[^\S\n]*[:\-]?[^\S\n]*{AMOUNT}"
        ))
        .expect("valid regex"),
        Regex::new(r"(?i)([\d,]+\.\d{2})[^\S\n]*(?:total\s+amount\s+due|total\s+due|amount\s+due|outstanding)")
            .expect("valid regex"),
    ]
});

static MINIMUM_DUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)minimum\s+(?:amount\s+)?(?:due|payable)[^\S\n]*[:\-]?[^\S\n]*{AMOUNT}"
    ))
    .expect("valid regex")
});

static DUE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:payment\s+due\s+date|due\s+date|pay\s+by|payment\s+due)[^\S\n]*[:\-]?[^\S\n]*({DATE})"
    ))
    .expect("valid regex")
});

static DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)({DATE})[^\S\n]+to[^\S\n]+({DATE})")).expect("valid regex")
});

static STATEMENT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)statement\s+(?:date|period)[^\S\n]*[:\-]?[^\S\n]*({DATE})"
    ))
    .expect("valid regex")
});

/// Total amount due, from the first line that states one
pub fn extract_total_due(text: &str) -> Option<f64> {
    for re in TOTAL_DUE.iter() {
        let found = text
            .lines()
            .filter(|line| !line.to_lowercase().contains("minimum"))
            .filter_map(|line| re.captures(line))
            .find_map(|caps| normalize_amount(&caps[1]).ok());
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn extract_minimum_due(text: &str) -> Option<f64> {
    MINIMUM_DUE
        .captures_iter(text)
        .find_map(|caps| normalize_amount(&caps[1]).ok())
}

/// Payment due date (`Due Date`, `Pay by`, `Payment Due`)
pub fn extract_due_date(text: &str) -> Option<NaiveDate> {
    DUE_DATE
        .captures_iter(text)
        .find_map(|caps| normalize_date(&caps[1]).ok())
}

/// Month and year the statement covers.
///
/// A `... to ...` date range gives the month of its end date; otherwise a
/// dated `Statement Date` / `Statement Period` label is used. Month names on
/// their own are not enough to place a statement.
pub fn extract_statement_period(text: &str) -> Option<StatementPeriod> {
    let from_range = DATE_RANGE
        .captures_iter(text)
        .find_map(|caps| normalize_date(&caps[2]).ok());

    from_range
        .or_else(|| {
            STATEMENT_DATE
                .captures_iter(text)
                .find_map(|caps| normalize_date(&caps[1]).ok())
        })
        .map(StatementPeriod::of)
}

/// Everything the statement says about itself.
///
/// `None` unless a total amount due is found.
pub fn extract_summary(text: &str) -> Option<StatementSummary> {
    let total = extract_total_due(text)?;
    Some(StatementSummary {
        total_amount_due: Some(total),
        minimum_amount_due: extract_minimum_due(text),
        payment_due_date: extract_due_date(text),
        statement_period: extract_statement_period(text),
    })
}
