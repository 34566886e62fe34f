//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - init and shared utilities (config loading, open_db, period arguments)
//! - `parse` - One-off extraction of a single file
//! - `ingest` - Mailbox ingestion through the pipeline
//! - `ledger` - Stored transactions, verifications and due bills
//! - `reset` - Clearing processed markers and purging stored data
//! - `export` - CSV export

pub mod core;
pub mod export;
pub mod ingest;
pub mod ledger;
pub mod parse;
pub mod reset;

// Re-export command functions for main.rs
pub use core::*;
pub use export::*;
pub use ingest::*;
pub use ledger::*;
pub use parse::*;
pub use reset::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
