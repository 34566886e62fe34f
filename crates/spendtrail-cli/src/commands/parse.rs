//! Single-file extraction (no database writes)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use spendtrail_core::{
    AppConfig, Attachment, Dispatcher, DocumentReader, ExtractionPath, IssuerConfig,
    ParsedStatement, PdfTextReader, RawEmailRecord,
};

use super::truncate;

/// Configured issuer by identity, else an ad-hoc one keyed by the argument
pub fn issuer_for(config: &AppConfig, issuer: &str) -> IssuerConfig {
    config
        .issuer(issuer)
        .cloned()
        .unwrap_or_else(|| IssuerConfig::new(issuer))
}

/// Wrap a file as a one-message email: PDFs become an attachment, anything
/// else is read as body text.
pub fn file_as_email(file: &Path) -> Result<RawEmailRecord> {
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut email = RawEmailRecord {
        id: format!("file:{}", file.display()),
        subject: filename.clone(),
        sender: String::new(),
        date: None,
        body_text: String::new(),
        attachments: Vec::new(),
    };

    if filename.to_lowercase().ends_with(".pdf") {
        let bytes =
            fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
        email.attachments.push(Attachment {
            filename,
            content_type: "application/pdf".to_string(),
            bytes,
        });
    } else {
        email.body_text = fs::read_to_string(file)
            .with_context(|| format!("Failed to read file: {}", file.display()))?;
    }

    Ok(email)
}

pub fn parse_file(
    config: &AppConfig,
    reader: &dyn DocumentReader,
    file: &Path,
    issuer: &str,
    password: Option<&str>,
) -> Result<ParsedStatement> {
    let mut issuer = issuer_for(config, issuer);
    if let Some(password) = password {
        issuer.decryption_key = Some(password.to_string());
    }

    let registry = config
        .build_registry()
        .context("Failed to build strategy registry")?;
    let email = file_as_email(file)?;
    let dispatcher = Dispatcher::new(&registry, reader);

    Ok(dispatcher.process_email(
        &issuer.identity,
        &issuer.strategy_key(),
        issuer.decryption_key.as_deref(),
        &email,
    ))
}

pub fn cmd_parse(
    config: &AppConfig,
    file: &Path,
    issuer: &str,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    let parsed = parse_file(config, &PdfTextReader::new(), file, issuer, password)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    print_parsed(&parsed);
    Ok(())
}

fn print_parsed(parsed: &ParsedStatement) {
    println!();
    println!("📄 {} ({})", parsed.issuer, parsed.message_id);

    for doc in &parsed.documents {
        let path = match &doc.path {
            ExtractionPath::Strategy(key) => format!("strategy {}", key),
            ExtractionPath::Fallback(mode) => format!("{} fallback", mode.as_str()),
            ExtractionPath::Nothing => "nothing extracted".to_string(),
        };
        println!(
            "   {:?}: {:?}, {} rows via {}",
            doc.origin,
            doc.stage,
            doc.rows.len(),
            path
        );
    }

    if parsed.transactions.is_empty() {
        println!("   No transactions found.");
    } else {
        println!("   ─────────────────────────────────────────────────────────────");
        for tx in &parsed.transactions {
            println!(
                "   {} │ {:>12.2} │ {}",
                tx.transaction_date,
                tx.amount,
                truncate(&tx.description, 40)
            );
        }
        let total: f64 = parsed.transactions.iter().map(|t| t.amount).sum();
        println!("   ─────────────────────────────────────────────────────────────");
        println!("   {} rows, net {:.2}", parsed.transactions.len(), total);
    }

    if let Some(summary) = &parsed.summary {
        println!();
        if let Some(total) = summary.total_amount_due {
            println!("   Total due:   {:.2}", total);
        }
        if let Some(minimum) = summary.minimum_amount_due {
            println!("   Minimum due: {:.2}", minimum);
        }
        if let Some(period) = summary.statement_period {
            println!("   Statement:   {}", period);
        }
    }
    if let Some(due) = parsed.due_date {
        println!("   Pay by:      {}", due);
    }
}
