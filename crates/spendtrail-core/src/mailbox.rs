//! Offline mailbox files
//!
//! A mailbox file is a JSON array of already-downloaded messages, each naming
//! the issuer it belongs to. Attachments are referenced by path, relative to
//! the mailbox file.
//!
//! ```json
//! [
//!   {
//!     "issuer": "SBI",
//!     "id": "<msg-1@bank>",
//!     "subject": "Your SBI Card statement",
//!     "sender": "statements@sbicard.com",
//!     "date": "2025-08-16",
//!     "body": "",
//!     "attachments": [{ "path": "sbi-aug.pdf" }]
//!   }
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Attachment, RawEmailRecord};

#[derive(Debug, Clone, Deserialize)]
pub struct MailboxAttachment {
    pub path: PathBuf,
    /// Defaults to the file name of `path`
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailboxMessage {
    pub issuer: String,
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<MailboxAttachment>,
}

impl MailboxMessage {
    /// Read attachment bytes and build the record the pipeline consumes
    pub fn into_record(self, base_dir: &Path) -> Result<RawEmailRecord> {
        let attachments = self
            .attachments
            .into_iter()
            .map(|a| {
                let path = base_dir.join(&a.path);
                let bytes = fs::read(&path).map_err(|e| {
                    Error::InvalidData(format!("attachment {}: {}", path.display(), e))
                })?;
                let filename = a.filename.unwrap_or_else(|| {
                    a.path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                });
                Ok(Attachment {
                    filename,
                    content_type: a
                        .content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    bytes,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RawEmailRecord {
            id: self.id,
            subject: self.subject,
            sender: self.sender,
            date: self.date,
            body_text: self.body,
            attachments,
        })
    }
}

/// Load a mailbox file as (issuer, record) pairs in file order
pub fn load_mailbox(path: &Path) -> Result<Vec<(String, RawEmailRecord)>> {
    let content = fs::read_to_string(path)?;
    let messages: Vec<MailboxMessage> = serde_json::from_str(&content)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));

    debug!("Loaded {} messages from {}", messages.len(), path.display());
    messages
        .into_iter()
        .map(|m| {
            let issuer = m.issuer.clone();
            m.into_record(base_dir).map(|record| (issuer, record))
        })
        .collect()
}
