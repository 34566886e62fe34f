//! Application configuration
//!
//! Loaded once at startup from TOML and passed by reference. Secrets named
//! through `decryption_key_env` are resolved here, at load time, so no
//! extraction code ever looks at the environment.
//!
//! Lookup order:
//! 1. An explicit path (`--config`); it must exist
//! 2. `<data_local_dir>/spendtrail/config.toml` if present
//! 3. Built-in defaults (no issuers, `spendtrail.db` in the working directory)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::strategy::{LayoutSpec, LayoutStrategy, StrategyRegistry};

fn default_db_path() -> PathBuf {
    PathBuf::from("spendtrail.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// One card issuer to process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Persistence key; also names the issuer in logs
    pub identity: String,
    /// Registry key; defaults to the lower-cased identity
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub decryption_key: Option<String>,
    /// Environment variable holding the decryption key
    #[serde(default)]
    pub decryption_key_env: Option<String>,
    /// Case-insensitive text a message subject must contain
    #[serde(default)]
    pub subject_filter: Option<String>,
    /// Registers a layout strategy under this issuer's strategy key
    #[serde(default)]
    pub layout: Option<LayoutSpec>,
}

impl IssuerConfig {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            strategy: None,
            decryption_key: None,
            decryption_key_env: None,
            subject_filter: None,
            layout: None,
        }
    }

    pub fn strategy_key(&self) -> String {
        self.strategy
            .as_deref()
            .unwrap_or(&self.identity)
            .trim()
            .to_lowercase()
    }

    pub fn matches_subject(&self, subject: &str) -> bool {
        match &self.subject_filter {
            Some(filter) => subject.to_lowercase().contains(&filter.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub issuers: Vec<IssuerConfig>,
}

impl AppConfig {
    /// Parse TOML and resolve environment-held keys
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
        config.resolve_keys(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Explicit path, then the default location, then built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn issuer(&self, identity: &str) -> Option<&IssuerConfig> {
        self.issuers
            .iter()
            .find(|i| i.identity.eq_ignore_ascii_case(identity.trim()))
    }

    /// Built-in strategies plus every configured layout
    pub fn build_registry(&self) -> Result<StrategyRegistry> {
        let mut registry = StrategyRegistry::with_builtins();
        for issuer in &self.issuers {
            if let Some(layout) = &issuer.layout {
                let strategy = LayoutStrategy::new(&issuer.strategy_key(), layout)?;
                registry.register(Box::new(strategy));
            }
        }
        Ok(registry)
    }

    fn resolve_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for issuer in &mut self.issuers {
            if issuer.decryption_key.is_some() {
                continue;
            }
            if let Some(var) = &issuer.decryption_key_env {
                issuer.decryption_key = lookup(var);
                if issuer.decryption_key.is_none() {
                    warn!("{}: environment variable {} is not set", issuer.identity, var);
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for (idx, issuer) in self.issuers.iter().enumerate() {
            if issuer.identity.trim().is_empty() {
                return Err(Error::Config(format!("issuer #{} has an empty identity", idx + 1)));
            }
            if self.issuers[..idx]
                .iter()
                .any(|other| other.identity.eq_ignore_ascii_case(&issuer.identity))
            {
                return Err(Error::Config(format!(
                    "issuer '{}' is configured twice",
                    issuer.identity
                )));
            }
        }
        Ok(())
    }
}

/// Default config location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("spendtrail").join("config.toml"))
}
