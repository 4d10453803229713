//! Database configuration module.
//!
//! Opens and closes the `SQLite` store, creates all tables from the entity
//! definitions and brings older databases up to date. Tables are generated with
//! `SeaORM`'s `Schema::create_table_from_entity`, so a fresh database always
//! matches the Rust structs; databases created by earlier versions are patched
//! column by column by [`migrate_columns`].

use crate::config::settings::DatabaseSettings;
use crate::entities::{
    AuditLog, AuditLogColumn, Account, Batch, BatchItem, BatchItemColumn, Category,
    CategoryColumn, FinanceTransaction, FinanceTransactionColumn, Party, Recipient, SystemState,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema, Statement,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Columns added after the first release, with the DDL used to add them.
///
/// Each entry is `(table, column, column definition)`.
const COLUMN_MIGRATIONS: &[(&str, &str, &str)] = &[
    ("recipients", "note", "TEXT"),
    ("recipients", "family_group_id", "INTEGER"),
    ("recipients", "zoom_eligible", "INTEGER NOT NULL DEFAULT 1"),
    ("batches", "total_saturdays", "INTEGER NOT NULL DEFAULT 4"),
    ("batches", "transport_rate", "INTEGER NOT NULL DEFAULT 25000"),
    ("batches", "zoom_single_rate", "INTEGER NOT NULL DEFAULT 50000"),
    ("batches", "zoom_family_rate", "INTEGER NOT NULL DEFAULT 30000"),
    ("batches", "type", "TEXT NOT NULL DEFAULT 'monthly'"),
    ("batches", "default_amount", "INTEGER NOT NULL DEFAULT 0"),
    ("batches", "status", "TEXT NOT NULL DEFAULT 'active'"),
    ("batch_items", "transfer_proof", "TEXT"),
    ("batch_items", "saturdays_attended", "INTEGER NOT NULL DEFAULT 0"),
    ("batch_items", "zoom_type", "TEXT NOT NULL DEFAULT 'none'"),
    ("batch_items", "transfer_fee", "INTEGER NOT NULL DEFAULT 0"),
    ("batch_items", "payment_method", "TEXT NOT NULL DEFAULT 'transfer'"),
];

/// Resolves the database URL: `DATABASE_URL` from the environment wins over the
/// configured value.
#[must_use]
pub fn get_database_url(settings: &DatabaseSettings) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| settings.url.clone())
}

/// Opens the store described by `settings`.
///
/// File databases get their parent directory created and are switched to WAL
/// mode so readers never block the single writer.
pub async fn open(settings: &DatabaseSettings) -> Result<DatabaseConnection> {
    let url = get_database_url(settings);

    if let Some(dir) = sqlite_file_path(&url).and_then(|path| path.parent().map(Path::to_path_buf))
    {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(&dir).await?;
        }
    }

    let mut options = ConnectOptions::new(url.clone());
    options
        .max_connections(settings.max_connections.max(1))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;

    if sqlite_file_path(&url).is_some() {
        db.execute_unprepared("PRAGMA journal_mode = WAL").await?;
    }

    info!("Opened database at {url}");
    Ok(db)
}

/// Closes the store, waiting for pooled connections to shut down.
pub async fn close(db: DatabaseConnection) -> Result<()> {
    db.close().await?;
    info!("Database closed");
    Ok(())
}

/// Extracts the file path from an `sqlite://` URL, `None` for in-memory databases.
fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}

/// Creates all tables and indexes that do not exist yet.
///
/// Uses `SeaORM`'s schema generation from the entity definitions so the
/// generated SQL always matches the models.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Recipient),
        schema.create_table_from_entity(Batch),
        schema.create_table_from_entity(BatchItem),
        schema.create_table_from_entity(Party),
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(Account),
        schema.create_table_from_entity(FinanceTransaction),
        schema.create_table_from_entity(AuditLog),
        schema.create_table_from_entity(SystemState),
    ];

    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    for index in indexes() {
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .if_not_exists()
            .name("idx_batch_items_batch_recipient")
            .table(BatchItem)
            .col(BatchItemColumn::BatchId)
            .col(BatchItemColumn::RecipientId)
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_categories_kind_name")
            .table(Category)
            .col(CategoryColumn::Kind)
            .col(CategoryColumn::Name)
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_transactions_type_date")
            .table(FinanceTransaction)
            .col(FinanceTransactionColumn::TxnType)
            .col(FinanceTransactionColumn::TxnDate)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_transactions_sub_type_date")
            .table(FinanceTransaction)
            .col(FinanceTransactionColumn::SubType)
            .col(FinanceTransactionColumn::TxnDate)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_transactions_category_date")
            .table(FinanceTransaction)
            .col(FinanceTransactionColumn::CategoryId)
            .col(FinanceTransactionColumn::TxnDate)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_transactions_status")
            .table(FinanceTransaction)
            .col(FinanceTransactionColumn::Status)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_transactions_reference_no")
            .table(FinanceTransaction)
            .col(FinanceTransactionColumn::ReferenceNo)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_audit_entity")
            .table(AuditLog)
            .col(AuditLogColumn::Entity)
            .col(AuditLogColumn::EntityId)
            .to_owned(),
    ]
}

/// Returns the column names of `table` as reported by `PRAGMA table_info`.
pub async fn existing_columns<C: ConnectionTrait>(db: &C, table: &str) -> Result<HashSet<String>> {
    let backend = db.get_database_backend();
    let rows = db
        .query_all(Statement::from_string(
            backend,
            format!("PRAGMA table_info({table})"),
        ))
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String>("", "name").map_err(Into::into))
        .collect()
}

/// Adds every column from [`COLUMN_MIGRATIONS`] that the table lacks.
///
/// Returns the number of columns added.
pub async fn migrate_columns<C: ConnectionTrait>(db: &C) -> Result<usize> {
    let mut added = 0;
    let mut tables: Vec<&str> = COLUMN_MIGRATIONS.iter().map(|&(table, _, _)| table).collect();
    tables.dedup();

    for table in tables {
        let columns = existing_columns(db, table).await?;
        let missing = COLUMN_MIGRATIONS
            .iter()
            .filter(|&&(t, column, _)| t == table && !columns.contains(column));

        for &(_, column, definition) in missing {
            db.execute_unprepared(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} {definition}"
            ))
            .await?;
            info!("Added column {table}.{column}");
            added += 1;
        }
    }

    debug!("Column migrations complete, {added} added");
    Ok(added)
}

/// Rewrites every stored payment method to exactly `transfer` or `cash`.
pub async fn normalize_payment_methods<C: ConnectionTrait>(db: &C) -> Result<u64> {
    let result = db
        .execute_unprepared(
            "UPDATE batch_items
             SET payment_method = CASE
                 WHEN lower(trim(COALESCE(payment_method, ''))) = 'cash' THEN 'cash'
                 ELSE 'transfer'
             END
             WHERE payment_method IS NULL OR payment_method NOT IN ('transfer', 'cash')",
        )
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{
        AccountModel, AuditLogModel, BatchItemModel, BatchModel, CategoryModel,
        FinanceTransactionModel, PartyModel, RecipientModel, SystemStateModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    async fn memory_db() -> Result<DatabaseConnection> {
        Ok(Database::connect("sqlite::memory:").await?)
    }

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = memory_db().await?;
        create_tables(&db).await?;

        let _: Vec<RecipientModel> = Recipient::find().limit(1).all(&db).await?;
        let _: Vec<BatchModel> = Batch::find().limit(1).all(&db).await?;
        let _: Vec<BatchItemModel> = BatchItem::find().limit(1).all(&db).await?;
        let _: Vec<PartyModel> = Party::find().limit(1).all(&db).await?;
        let _: Vec<CategoryModel> = Category::find().limit(1).all(&db).await?;
        let _: Vec<AccountModel> = Account::find().limit(1).all(&db).await?;
        let _: Vec<FinanceTransactionModel> = FinanceTransaction::find().limit(1).all(&db).await?;
        let _: Vec<AuditLogModel> = AuditLog::find().limit(1).all(&db).await?;
        let _: Vec<SystemStateModel> = SystemState::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = memory_db().await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_migrate_columns_on_current_schema_adds_nothing() -> Result<()> {
        let db = memory_db().await?;
        create_tables(&db).await?;
        assert_eq!(migrate_columns(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_migrate_columns_patches_legacy_tables() -> Result<()> {
        let db = memory_db().await?;
        db.execute_unprepared(
            "CREATE TABLE recipients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                bank_name TEXT,
                account_number TEXT,
                whatsapp TEXT,
                transfer_to_id INTEGER,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .await?;
        db.execute_unprepared(
            "CREATE TABLE batches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .await?;
        db.execute_unprepared(
            "CREATE TABLE batch_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id INTEGER NOT NULL,
                recipient_id INTEGER NOT NULL,
                amount INTEGER NOT NULL DEFAULT 0,
                transfer_status TEXT NOT NULL DEFAULT 'pending',
                notify_status TEXT NOT NULL DEFAULT 'pending',
                transfer_at TEXT,
                notified_at TEXT,
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .await?;

        let added = migrate_columns(&db).await?;
        assert_eq!(added, COLUMN_MIGRATIONS.len());

        let batch_columns = existing_columns(&db, "batches").await?;
        assert!(batch_columns.contains("type"));
        assert!(batch_columns.contains("zoom_family_rate"));

        let item_columns = existing_columns(&db, "batch_items").await?;
        assert!(item_columns.contains("payment_method"));
        assert!(item_columns.contains("transfer_proof"));

        // Second run finds everything in place
        assert_eq!(migrate_columns(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_normalize_payment_methods() -> Result<()> {
        let db = memory_db().await?;
        db.execute_unprepared(
            "CREATE TABLE batch_items (id INTEGER PRIMARY KEY, payment_method TEXT)",
        )
        .await?;
        db.execute_unprepared(
            "INSERT INTO batch_items (id, payment_method) VALUES
                (1, ' Cash '), (2, 'TRANSFER'), (3, NULL), (4, 'cash'), (5, 'giro')",
        )
        .await?;

        assert_eq!(normalize_payment_methods(&db).await?, 4);

        let rows = db
            .query_all(Statement::from_string(
                db.get_database_backend(),
                "SELECT payment_method FROM batch_items ORDER BY id".to_string(),
            ))
            .await?;
        let methods: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String>("", "payment_method").unwrap())
            .collect();
        assert_eq!(methods, ["cash", "transfer", "transfer", "cash", "transfer"]);
        Ok(())
    }

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file_path("sqlite://data/app.sqlite?mode=rwc"),
            Some(Path::new("data/app.sqlite"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }
}
