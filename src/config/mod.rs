/// Database connection lifecycle, table creation and column migrations
pub mod database;

/// Application settings and seed data loaded from config.toml
pub mod settings;

pub use settings::{AppConfig, BatchDefaults, CategorySeed, RecipientSeed};
