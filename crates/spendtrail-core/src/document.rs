//! Turning attachment bytes into statement text

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::debug;

use crate::error::{Error, Result};

/// Reads the plain text out of a binary statement document
pub trait DocumentReader {
    /// Pages are concatenated in order. A document that cannot be opened
    /// (wrong key, corrupt bytes) fails with `Error::DocumentOpen`.
    fn read_text(&self, bytes: &[u8], decryption_key: Option<&str>) -> Result<String>;
}

/// PDF text extraction backed by `pdf-extract`.
///
/// A configured key is tried first; some issuers send unprotected files
/// even when a password is configured, so opening without one is tried next.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextReader;

impl PdfTextReader {
    pub fn new() -> Self {
        Self
    }

    fn open(bytes: &[u8], key: Option<&str>) -> std::result::Result<String, String> {
        // pdf-extract panics on some malformed files
        let outcome = catch_unwind(AssertUnwindSafe(|| match key {
            Some(key) => pdf_extract::extract_text_from_mem_encrypted(bytes, key),
            None => pdf_extract::extract_text_from_mem(bytes),
        }));

        match outcome {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("PDF parser panicked".to_string()),
        }
    }
}

impl DocumentReader for PdfTextReader {
    fn read_text(&self, bytes: &[u8], decryption_key: Option<&str>) -> Result<String> {
        let keyed = match decryption_key {
            Some(key) => match Self::open(bytes, Some(key)) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    debug!("Opening PDF with key failed: {}", e);
                    Some(e)
                }
            },
            None => None,
        };

        Self::open(bytes, None).map_err(|e| {
            Error::DocumentOpen(match keyed {
                Some(keyed) => format!("with key: {}; without key: {}", keyed, e),
                None => e,
            })
        })
    }
}
