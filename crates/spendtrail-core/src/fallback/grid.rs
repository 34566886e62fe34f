//! Structured-grid fallback
//!
//! Works on rows of cells. Columns are identified by header keywords first;
//! when the header does not name all three of date, description and amount,
//! the first few data rows are sniffed instead.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::RawRow;
use crate::normalize::normalize_amount;

const DATE_HEADERS: &[&str] = &["date", "transaction date", "tran date", "posting date"];
const DESCRIPTION_HEADERS: &[&str] = &[
    "description",
    "merchant",
    "particulars",
    "details",
    "narration",
];
const AMOUNT_HEADERS: &[&str] = &["amount", "debit", "credit", "transaction amount", "value"];
const POINTS_HEADERS: &[&str] = &["points", "reward", "rewards"];
const CATEGORY_HEADERS: &[&str] = &["category", "classification", "type", "mcc"];

/// Data rows examined when sniffing columns by content
const SNIFF_ROWS: usize = 4;

/// Rows with fewer cells are not table rows
const MIN_CELLS: usize = 3;

static CELL_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}|\t|\|").expect("valid regex"));

static DATE_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d{4}-\d{2}-\d{2}|\d{1,2}[ \-][A-Za-z]{3,9}[ ,\-]+\d{2,4})$")
        .expect("valid regex")
});

static NUMERIC_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d,.\s₹$()+\-]*$").expect("valid regex"));

static MONEY_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\.\d{2}(?:\D|$)").expect("valid regex"));

/// A table: rows of cells, header (if any) first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }
}

/// Column positions for the fields a row needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    /// A separate credit column when the amount column holds debits only
    pub credit: Option<usize>,
    pub points: Option<usize>,
    pub category: Option<usize>,
}

impl ColumnMap {
    fn is_complete(&self) -> bool {
        self.date.is_some() && self.description.is_some() && self.amount.is_some()
    }
}

/// Find table-shaped runs in plain text.
///
/// Cells are separated by two or more spaces, a tab or `|`. Consecutive lines
/// with at least three cells form one grid.
pub fn detect_grids(text: &str) -> Vec<Grid> {
    let mut grids = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        let cells: Vec<String> = CELL_SPLIT
            .split(line.trim())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if cells.len() >= MIN_CELLS {
            current.push(cells);
        } else if !current.is_empty() {
            if current.len() >= 2 {
                grids.push(Grid::new(std::mem::take(&mut current)));
            }
            current.clear();
        }
    }
    if current.len() >= 2 {
        grids.push(Grid::new(current));
    }

    debug!("Detected {} grids", grids.len());
    grids
}

fn find_column(headers: &[String], keywords: &[&str], exclude: &[Option<usize>]) -> Option<usize> {
    headers.iter().enumerate().position(|(idx, header)| {
        !exclude.contains(&Some(idx)) && keywords.iter().any(|k| header.contains(k))
    })
}

fn cell(row: &[String], col: usize) -> &str {
    row.get(col).map(|c| c.trim()).unwrap_or("")
}

/// Match header cells against the synonym lists
pub fn map_headers(header_row: &[String]) -> ColumnMap {
    let headers: Vec<String> = header_row.iter().map(|h| h.trim().to_lowercase()).collect();

    let date = find_column(&headers, DATE_HEADERS, &[]);
    let description = find_column(&headers, DESCRIPTION_HEADERS, &[date]);
    let amount = find_column(&headers, AMOUNT_HEADERS, &[date, description]);
    let points = find_column(&headers, POINTS_HEADERS, &[date, description, amount]);
    let category = find_column(&headers, CATEGORY_HEADERS, &[date, description, amount, points]);

    let credit = amount
        .filter(|&a| headers[a].contains("debit"))
        .and_then(|_| find_column(&headers, &["credit"], &[date, description, amount, points]));

    ColumnMap {
        date,
        description,
        amount,
        credit,
        points,
        category,
    }
}

/// Identify columns from cell content
pub fn sniff_columns(sample: &[Vec<String>]) -> ColumnMap {
    let width = sample.iter().map(Vec::len).max().unwrap_or(0);

    let all_match = |col: usize, pred: &dyn Fn(&str) -> bool| {
        let cells: Vec<&str> = sample.iter().map(|r| cell(r, col)).filter(|c| !c.is_empty()).collect();
        !cells.is_empty() && cells.into_iter().all(|c| pred(c))
    };

    let date = (0..width).find(|&col| all_match(col, &|c: &str| DATE_CELL.is_match(c)));

    // Rightmost column of bounded numbers is the amount. Columns with
    // paise come first so a trailing points or count column loses.
    let numeric: Vec<usize> = (0..width)
        .rev()
        .filter(|&col| Some(col) != date)
        .filter(|&col| all_match(col, &|c: &str| normalize_amount(c).is_ok()))
        .collect();
    let amount = numeric
        .iter()
        .copied()
        .find(|&col| sample.iter().any(|r| MONEY_CELL.is_match(cell(r, col))))
        .or_else(|| numeric.first().copied());

    let description = (0..width)
        .filter(|&col| Some(col) != date && Some(col) != amount)
        .filter_map(|col| {
            let texts: Vec<&str> = sample
                .iter()
                .map(|r| cell(r, col))
                .filter(|c| !c.is_empty() && !NUMERIC_CELL.is_match(c))
                .collect();
            if texts.is_empty() {
                return None;
            }
            let avg = texts.iter().map(|t| t.chars().count()).sum::<usize>() / texts.len();
            Some((col, avg))
        })
        .max_by_key(|&(col, avg)| (avg, std::cmp::Reverse(col)))
        .map(|(col, _)| col);

    ColumnMap {
        date,
        description,
        amount,
        ..Default::default()
    }
}

/// Raw rows from one grid
pub fn scan_grid(grid: &Grid) -> Vec<RawRow> {
    let Some(first) = grid.rows.first() else {
        return Vec::new();
    };

    let by_header = map_headers(first);
    let (columns, data) = if by_header.is_complete() {
        (by_header, &grid.rows[1..])
    } else {
        let sample_start = usize::from(grid.rows.len() > 1);
        let sample_end = (sample_start + SNIFF_ROWS).min(grid.rows.len());
        let sniffed = sniff_columns(&grid.rows[sample_start..sample_end]);
        debug!("Header match incomplete, sniffed columns {:?}", sniffed);
        (sniffed, &grid.rows[..])
    };

    let (Some(date_col), Some(desc_col), Some(amount_col)) =
        (columns.date, columns.description, columns.amount)
    else {
        debug!("Grid has no usable date/description/amount columns");
        return Vec::new();
    };

    let get = |row: &Vec<String>, col: Option<usize>| {
        col.and_then(|c| row.get(c))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut rows = Vec::new();
    for row in data {
        if row.len() < MIN_CELLS {
            continue;
        }
        let (Some(date), Some(description)) = (get(row, Some(date_col)), get(row, Some(desc_col)))
        else {
            continue;
        };

        let (amount, credit) = match (get(row, Some(amount_col)), get(row, columns.credit)) {
            (Some(amount), _) => (amount, false),
            (None, Some(credit)) => (credit, true),
            (None, None) => continue,
        };

        rows.push(
            RawRow::new(&date, &description, &amount)
                .with_credit(credit)
                .with_points(get(row, columns.points).as_deref())
                .with_classification(get(row, columns.category).as_deref()),
        );
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_header_mapping() {
        let headers: Vec<String> = ["Transaction Date", "Particulars", "Reward Points", "Amount (INR)", "Category"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = map_headers(&headers);
        assert_eq!(map.date, Some(0));
        assert_eq!(map.description, Some(1));
        assert_eq!(map.points, Some(2));
        assert_eq!(map.amount, Some(3));
        assert_eq!(map.category, Some(4));
    }

    #[test]
    fn test_scan_with_headers() {
        let g = grid(&[
            &["Date", "Description", "Points", "Amount", "Category"],
            &["01/08/2025", "BIG BASKET", "4", "1,020.00", "Groceries"],
            &["", "continued text", "", "", ""],
            &["03/08/2025", "IRCTC", "", "745.00", "Travel"],
        ]);
        let rows = scan_grid(&g);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "BIG BASKET");
        assert_eq!(rows[0].points.as_deref(), Some("4"));
        assert_eq!(rows[0].classification.as_deref(), Some("Groceries"));
        assert_eq!(rows[1].amount, "745.00");
    }

    #[test]
    fn test_debit_credit_columns() {
        let g = grid(&[
            &["Date", "Narration", "Debit", "Credit"],
            &["01/08/2025", "SHOP", "100.00", ""],
            &["02/08/2025", "MERCHANT REVERSAL", "", "40.00"],
        ]);
        let rows = scan_grid(&g);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].credit);
        assert!(rows[1].credit);
        assert_eq!(rows[1].amount, "40.00");
    }

    #[test]
    fn test_sniffed_columns_without_header() {
        let g = grid(&[
            &["12345678901234", "05/08/2025", "SWIGGY INSTAMART", "312.40"],
            &["12345678901299", "06/08/2025", "UBER TRIP HELP.UBER.COM", "199.00"],
        ]);
        let rows = scan_grid(&g);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "05/08/2025");
        assert_eq!(rows[0].description, "SWIGGY INSTAMART");
        assert_eq!(rows[1].amount, "199.00");
    }

    #[test]
    fn test_sniff_prefers_money_over_points() {
        let sample: Vec<Vec<String>> = [
            ["01/06/2025", "SHOP ONE", "100.00", "5"],
            ["02/06/2025", "FUEL STATION", "1,250.50", "12"],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
        let map = sniff_columns(&sample);
        assert_eq!(map.date, Some(0));
        assert_eq!(map.description, Some(1));
        assert_eq!(map.amount, Some(2));

        // Whole-rupee amounts still resolve to the rightmost number column
        let whole: Vec<Vec<String>> = [["01/06/2025", "SHOP ONE", "7", "100"]]
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        assert_eq!(sniff_columns(&whole).amount, Some(3));
    }

    #[test]
    fn test_detect_grids() {
        let text = "Header text\nDate  Description  Amount\n01/08/2025  SHOP ONE  10.00\n02/08/2025 | SHOP TWO | 20.00\nfooter\nx  y  z";
        let grids = detect_grids(text);
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].rows.len(), 3);
        assert_eq!(grids[0].rows[2], vec!["02/08/2025", "SHOP TWO", "20.00"]);
    }
}
