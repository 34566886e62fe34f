//! Error types for spendtrail

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unable to parse date: {0}")]
    DateParse(String),

    #[error("Unable to parse amount: {0}")]
    AmountParse(String),

    #[error("Transaction section not found for strategy: {0}")]
    SegmentNotFound(String),

    #[error("Unable to open document: {0}")]
    DocumentOpen(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Errors that only cost one row; the caller drops the row and moves on
    pub fn is_row_local(&self) -> bool {
        matches!(self, Self::DateParse(_) | Self::AmountParse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
