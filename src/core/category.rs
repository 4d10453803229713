//! Category lookups and seeding.
//!
//! Categories are unique per `(kind, name)`; the ledger sync creates the
//! expense categories it needs on first use.

use crate::{
    config::CategorySeed,
    entities::{Category, TxnType, category},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Returns the id of the category `(kind, name)`, creating it if missing.
///
/// Matching is exact and case-sensitive.
pub async fn ensure_category<C: ConnectionTrait>(conn: &C, kind: TxnType, name: &str) -> Result<i64> {
    if name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Category name cannot be empty".to_string(),
        });
    }

    if let Some(existing) = Category::find()
        .filter(category::Column::Kind.eq(kind))
        .filter(category::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing.id);
    }

    let now = Utc::now();
    let created = category::ActiveModel {
        name: Set(name.to_string()),
        kind: Set(kind),
        parent_id: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    info!("Created {kind:?} category '{name}'");
    Ok(created.id)
}

/// Active categories, optionally restricted to one kind, ordered by name.
pub async fn get_active_categories(
    db: &DatabaseConnection,
    kind: Option<TxnType>,
) -> Result<Vec<category::Model>> {
    let mut query = Category::find().filter(category::Column::IsActive.eq(true));
    if let Some(kind) = kind {
        query = query.filter(category::Column::Kind.eq(kind));
    }
    query
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Inserts `seeds` when the category table is empty. Returns the number inserted.
pub async fn seed_categories(db: &DatabaseConnection, seeds: &[CategorySeed]) -> Result<usize> {
    if Category::find().count(db).await? > 0 {
        return Ok(0);
    }

    let txn = db.begin().await?;
    for seed in seeds {
        ensure_category(&txn, seed.kind, &seed.name).await?;
    }
    txn.commit().await?;

    info!("Seeded {} categories", seeds.len());
    Ok(seeds.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::AppConfig;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_ensure_category_creates_once() -> Result<()> {
        let db = setup_test_db().await?;

        let first = ensure_category(&db, TxnType::Expense, "Bantuan Sosial").await?;
        let second = ensure_category(&db, TxnType::Expense, "Bantuan Sosial").await?;
        assert_eq!(first, second);

        // Same name, other kind is a separate category
        let income = ensure_category(&db, TxnType::Income, "Bantuan Sosial").await?;
        assert_ne!(first, income);

        // Case-sensitive
        let lower = ensure_category(&db, TxnType::Expense, "bantuan sosial").await?;
        assert_ne!(first, lower);

        assert_eq!(Category::find().count(&db).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_category_rejects_empty_name() -> Result<()> {
        let db = setup_test_db().await?;
        let result = ensure_category(&db, TxnType::Expense, "  ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_categories_only_when_empty() -> Result<()> {
        let db = setup_test_db().await?;
        let seeds = AppConfig::default().categories;

        assert_eq!(seed_categories(&db, &seeds).await?, 6);
        assert_eq!(seed_categories(&db, &seeds).await?, 0);

        let expense = get_active_categories(&db, Some(TxnType::Expense)).await?;
        let names: Vec<_> = expense.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["Bantuan Sosial", "Kegiatan Pelayanan", "Operasional Gereja"]
        );
        assert_eq!(get_active_categories(&db, None).await?.len(), 6);
        Ok(())
    }
}
