//! Shared test utilities for the disbursement tracker.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    config::BatchDefaults,
    core::{
        batch::{NewBatch, create_batch},
        batch_item::{NewBatchItem, create_batch_item},
        recipient::{NewRecipient, create_recipient},
    },
    entities::{self, FinanceTransaction, ZoomType},
    errors::{Error, Result},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a zoom-eligible test recipient with no bank details.
pub async fn create_test_recipient(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::recipient::Model> {
    create_recipient(db, NewRecipient::new(name)).await
}

/// Creates a test recipient with custom bank details and note.
pub async fn create_custom_recipient(
    db: &DatabaseConnection,
    name: &str,
    bank_name: Option<&str>,
    account_number: Option<&str>,
    note: Option<&str>,
) -> Result<entities::recipient::Model> {
    let mut new = NewRecipient::new(name);
    new.bank_name = bank_name.map(ToString::to_string);
    new.account_number = account_number.map(ToString::to_string);
    new.note = note.map(ToString::to_string);
    create_recipient(db, new).await
}

/// Creates a monthly test batch.
///
/// # Defaults
/// * `total_saturdays`: 4
/// * `transport_rate`: 25,000
/// * `zoom_single_rate`: 50,000
/// * `zoom_family_rate`: 30,000
pub async fn create_test_batch(db: &DatabaseConnection, name: &str) -> Result<entities::batch::Model> {
    create_batch(db, NewBatch::monthly(name), &BatchDefaults::default()).await
}

/// Creates a special test batch paying `default_amount` per item.
pub async fn create_special_batch(
    db: &DatabaseConnection,
    name: &str,
    default_amount: i64,
) -> Result<entities::batch::Model> {
    create_batch(db, NewBatch::special(name, default_amount), &BatchDefaults::default()).await
}

/// Adds a recipient to a batch with the given attendance and a single zoom
/// allowance. With the default rates, 3 Saturdays yield 125,000.
pub async fn create_test_item(
    db: &DatabaseConnection,
    batch_id: i64,
    recipient_id: i64,
    saturdays_attended: i32,
) -> Result<entities::batch_item::Model> {
    let new = NewBatchItem {
        saturdays_attended,
        zoom_type: ZoomType::Single,
        ..NewBatchItem::new(recipient_id)
    };
    create_batch_item(db, batch_id, new)
        .await?
        .ok_or_else(|| Error::Validation {
            message: format!("Recipient {recipient_id} could not be added to batch {batch_id}"),
        })
}

/// Latest ledger row carrying `reference`.
pub async fn ledger_row(
    db: &DatabaseConnection,
    reference: &str,
) -> Result<Option<entities::finance_transaction::Model>> {
    FinanceTransaction::find()
        .filter(entities::finance_transaction::Column::ReferenceNo.eq(reference))
        .order_by_desc(entities::finance_transaction::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}
