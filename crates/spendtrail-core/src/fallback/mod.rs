//! Issuer-agnostic extraction, used when no strategy is registered for an
//! issuer or its strategy finds nothing.
//!
//! Grid mode runs first over table-shaped runs of the text; text mode scans
//! the raw lines when grid mode yields no rows. Both finish rows through the
//! same normalization and payment exclusion as the issuer strategies.

mod grid;
mod text;

use serde::Serialize;
use tracing::debug;

use crate::models::TransactionCandidate;
use crate::strategy::finalize_rows;

pub use grid::{detect_grids, map_headers, scan_grid, sniff_columns, ColumnMap, Grid};
pub use text::scan_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    Grid,
    Text,
}

impl FallbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Text => "text",
        }
    }
}

/// Rows from an already detected table
pub fn extract_from_grid(grid: &Grid) -> Vec<TransactionCandidate> {
    finalize_rows("grid", scan_grid(grid))
}

/// Rows from free text, ignoring any table structure
pub fn extract_from_text(text: &str) -> Vec<TransactionCandidate> {
    finalize_rows("text", scan_text(text))
}

/// Run grid mode, then text mode if grid mode found nothing.
///
/// The mode is `None` when neither produced a row.
pub fn extract_generic(text: &str) -> (Vec<TransactionCandidate>, Option<FallbackMode>) {
    let from_grids: Vec<TransactionCandidate> =
        detect_grids(text).iter().flat_map(extract_from_grid).collect();
    if !from_grids.is_empty() {
        debug!("Grid fallback produced {} rows", from_grids.len());
        return (from_grids, Some(FallbackMode::Grid));
    }

    let from_text = extract_from_text(text);
    if !from_text.is_empty() {
        debug!("Text fallback produced {} rows", from_text.len());
        return (from_text, Some(FallbackMode::Text));
    }

    (Vec::new(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_mode_when_no_grid() {
        let (rows, mode) = extract_generic("Dear customer\n12/05/2025 COFFEE SHOP 250.00\nThanks");
        assert_eq!(mode, Some(FallbackMode::Text));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, 250.0);
    }

    #[test]
    fn test_grid_mode_first() {
        let text = "Date  Description  Amount\n01/08/2025  BIG BASKET  1,020.00\n03/08/2025  PAYMENT RECEIVED  500.00\n04/08/2025  REFUND MYNTRA  300.00";
        let (rows, mode) = extract_generic(text);
        assert_eq!(mode, Some(FallbackMode::Grid));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, 1020.0);
        assert_eq!(rows[1].amount, -300.0);
    }

    #[test]
    fn test_nothing_found() {
        let (rows, mode) = extract_generic("no transactions in this email");
        assert!(rows.is_empty());
        assert_eq!(mode, None);
    }
}
