//! One-time tasks run every time the store is opened.

use crate::{
    config::{
        AppConfig,
        database::{create_tables, migrate_columns, normalize_payment_methods},
    },
    core::{
        category::seed_categories, ledger::sync_all_batches, proof::ProofStore,
        proof::migrate_inline_proofs, recipient::seed_recipients,
    },
    errors::Result,
};
use sea_orm::DatabaseConnection;
use tracing::{info, instrument};

/// What the startup tasks changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Columns added to existing tables
    pub columns_added: usize,
    /// Items whose payment method was rewritten
    pub payment_methods_normalized: u64,
    /// Recipients inserted from config
    pub recipients_seeded: usize,
    /// Categories inserted from config
    pub categories_seeded: usize,
    /// Batches whose ledger rows were re-derived
    pub batches_synced: usize,
    /// Inline proofs moved to the store
    pub proofs_migrated: usize,
}

/// Brings the store up to date: schema, legacy data, seeds, ledger rows and
/// inline proofs, in that order.
#[instrument(skip_all)]
pub async fn run_startup_tasks(
    db: &DatabaseConnection,
    config: &AppConfig,
    store: &dyn ProofStore,
) -> Result<StartupReport> {
    create_tables(db).await?;
    let columns_added = migrate_columns(db).await?;
    let payment_methods_normalized = normalize_payment_methods(db).await?;

    let recipients_seeded = seed_recipients(db, &config.recipients).await?;
    let categories_seeded = seed_categories(db, &config.categories).await?;

    let batches_synced = sync_all_batches(db).await?.len();
    let proofs_migrated = migrate_inline_proofs(db, store).await?;

    let report = StartupReport {
        columns_added,
        payment_methods_normalized,
        recipients_seeded,
        categories_seeded,
        batches_synced,
        proofs_migrated,
    };
    info!(?report, "Startup tasks finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::settings::parse_config;
    use crate::core::proof::MemoryProofStore;
    use crate::core::recipient::get_all_active_recipients;

    const CONFIG: &str = r#"
[[recipients]]
name = "Ana"
bank_name = "BCA"
account_number = "1234567890"

[[recipients]]
name = "Budi"
transfer_to = "Ana"
"#;

    #[tokio::test]
    async fn test_startup_seeds_once() -> Result<()> {
        let db = sea_orm::Database::connect("sqlite::memory:").await?;
        let config = parse_config(CONFIG)?;
        let store = MemoryProofStore::new();

        let first = run_startup_tasks(&db, &config, &store).await?;
        assert_eq!(first.recipients_seeded, 2);
        assert_eq!(first.categories_seeded, 6);
        assert_eq!(first.batches_synced, 0);
        assert_eq!(first.proofs_migrated, 0);

        let recipients = get_all_active_recipients(&db).await?;
        let ana = recipients.iter().find(|r| r.name == "Ana").unwrap();
        let budi = recipients.iter().find(|r| r.name == "Budi").unwrap();
        assert_eq!(budi.transfer_to_id, Some(ana.id));
        assert!(budi.family_group_id.is_some());
        assert_eq!(budi.family_group_id, ana.family_group_id);

        let second = run_startup_tasks(&db, &config, &store).await?;
        assert_eq!(second.columns_added, 0);
        assert_eq!(second.recipients_seeded, 0);
        assert_eq!(second.categories_seeded, 0);
        Ok(())
    }
}
