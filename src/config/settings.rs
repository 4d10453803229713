//! Application settings loaded from config.toml
//!
//! Every section is optional; missing sections fall back to the defaults
//! below. The recipient and category lists are only used to seed an empty
//! database on first start.

use crate::entities::TxnType;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "DISBURSEMENT_CONFIG";

/// Default SQLite location, created on demand
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/disbursement.sqlite?mode=rwc";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Database connection settings
    pub database: DatabaseSettings,
    /// Proof image storage settings
    pub storage: StorageSettings,
    /// Rates applied to new batches when the caller gives none
    pub batch_defaults: BatchDefaults,
    /// Recipients inserted when the recipient table is empty
    pub recipients: Vec<RecipientSeed>,
    /// Categories inserted when the category table is empty
    pub categories: Vec<CategorySeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            storage: StorageSettings::default(),
            batch_defaults: BatchDefaults::default(),
            recipients: Vec::new(),
            categories: default_categories(),
        }
    }
}

/// `[database]` section
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL; `DATABASE_URL` in the environment takes precedence
    pub url: String,
    /// Pool size. One connection serializes all writers.
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 1,
        }
    }
}

/// `[storage]` section
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding proof images
    pub proofs_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            proofs_dir: "data/proofs".to_string(),
        }
    }
}

/// `[batch_defaults]` section
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct BatchDefaults {
    /// Saturdays per monthly period
    pub total_saturdays: i32,
    /// Amount per attended Saturday
    pub transport_rate: i64,
    /// Single zoom allowance
    pub zoom_single_rate: i64,
    /// Family zoom allowance
    pub zoom_family_rate: i64,
}

impl Default for BatchDefaults {
    fn default() -> Self {
        Self {
            total_saturdays: 4,
            transport_rate: 25_000,
            zoom_single_rate: 50_000,
            zoom_family_rate: 30_000,
        }
    }
}

/// One `[[recipients]]` entry
#[derive(Debug, Deserialize, Clone)]
pub struct RecipientSeed {
    /// Recipient name, also used to resolve `transfer_to`
    pub name: String,
    /// Bank or e-wallet provider
    #[serde(default)]
    pub bank_name: Option<String>,
    /// Account number
    #[serde(default)]
    pub account_number: Option<String>,
    /// Contact handle
    #[serde(default)]
    pub whatsapp: Option<String>,
    /// Free-text note
    #[serde(default)]
    pub note: Option<String>,
    /// Name of the recipient whose account receives this recipient's money
    #[serde(default)]
    pub transfer_to: Option<String>,
}

/// One `[[categories]]` entry
#[derive(Debug, Deserialize, Clone)]
pub struct CategorySeed {
    /// Category name
    pub name: String,
    /// Income or expense
    pub kind: TxnType,
}

fn default_categories() -> Vec<CategorySeed> {
    [
        ("Persepuluhan", TxnType::Income),
        ("Persembahan", TxnType::Income),
        ("Donasi", TxnType::Income),
        ("Operasional Gereja", TxnType::Expense),
        ("Bantuan Sosial", TxnType::Expense),
        ("Kegiatan Pelayanan", TxnType::Expense),
    ]
    .into_iter()
    .map(|(name, kind)| CategorySeed {
        name: name.to_string(),
        kind,
    })
    .collect()
}

/// Loads configuration from a TOML file.
///
/// A missing file yields [`AppConfig::default`].
///
/// # Errors
/// Returns an error if the file exists but cannot be read or is not valid TOML.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!("Config file {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `$DISBURSEMENT_CONFIG`, falling back to ./config.toml
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}
