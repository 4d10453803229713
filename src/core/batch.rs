//! Batch business logic - creating, updating and summarizing payment batches.

use crate::{
    config::BatchDefaults,
    core::{amount::validate_non_negative, ledger::void_batch_ledger},
    entities::{Batch, BatchItem, BatchKind, BatchStatus, batch, batch_item},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    FromQueryResult, JoinType, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Input for [`create_batch`]. Unset rates come from [`BatchDefaults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatch {
    /// Monthly or special
    pub kind: BatchKind,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Monthly: defaults to `total_saturdays * transport_rate`; special: 0
    pub default_amount: Option<i64>,
    /// Saturdays in the period
    pub total_saturdays: Option<i32>,
    /// Amount per attended Saturday
    pub transport_rate: Option<i64>,
    /// Zoom allowance for a single recipient
    pub zoom_single_rate: Option<i64>,
    /// Zoom allowance per family member
    pub zoom_family_rate: Option<i64>,
}

impl NewBatch {
    /// A monthly batch using the configured defaults.
    #[must_use]
    pub fn monthly(name: impl Into<String>) -> Self {
        Self {
            kind: BatchKind::Monthly,
            name: name.into(),
            description: None,
            default_amount: None,
            total_saturdays: None,
            transport_rate: None,
            zoom_single_rate: None,
            zoom_family_rate: None,
        }
    }

    /// A special batch paying `default_amount` per item.
    #[must_use]
    pub fn special(name: impl Into<String>, default_amount: i64) -> Self {
        Self {
            kind: BatchKind::Special,
            default_amount: Some(default_amount),
            ..Self::monthly(name)
        }
    }
}

/// Partial update for [`update_batch`].
///
/// Rate changes do not recompute existing item amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPatch {
    /// New kind
    pub kind: Option<BatchKind>,
    /// Display name
    pub name: Option<String>,
    /// Free-text description
    pub description: Option<Option<String>>,
    /// Fixed per-item amount
    pub default_amount: Option<i64>,
    /// Saturdays in the period
    pub total_saturdays: Option<i32>,
    /// Amount per attended Saturday
    pub transport_rate: Option<i64>,
    /// Zoom allowance for a single recipient
    pub zoom_single_rate: Option<i64>,
    /// Zoom allowance per family member
    pub zoom_family_rate: Option<i64>,
    /// New status
    pub status: Option<BatchStatus>,
}

/// A batch with its item counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// The batch itself
    pub batch: batch::Model,
    /// Number of items
    pub total_items: i64,
    /// Items with `transfer_status = done`
    pub transferred_count: i64,
    /// Items with `notify_status = sent`
    pub notified_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct BatchCounts {
    id: i64,
    total_items: i64,
    transferred_count: i64,
    notified_count: i64,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation {
            message: "Batch name cannot be empty".to_string(),
        });
    }
    Ok(name.to_string())
}

fn validate_saturdays(total_saturdays: i32) -> Result<()> {
    if total_saturdays < 0 {
        return Err(Error::Validation {
            message: format!("Total Saturdays cannot be negative: {total_saturdays}"),
        });
    }
    Ok(())
}

/// Creates a batch, filling unset rates from `defaults`.
#[instrument(skip(db, new, defaults), fields(name = %new.name))]
pub async fn create_batch(
    db: &DatabaseConnection,
    new: NewBatch,
    defaults: &BatchDefaults,
) -> Result<batch::Model> {
    let name = validate_name(&new.name)?;
    let total_saturdays = new.total_saturdays.unwrap_or(defaults.total_saturdays);
    let transport_rate = new.transport_rate.unwrap_or(defaults.transport_rate);
    let zoom_single_rate = new.zoom_single_rate.unwrap_or(defaults.zoom_single_rate);
    let zoom_family_rate = new.zoom_family_rate.unwrap_or(defaults.zoom_family_rate);
    let default_amount = new.default_amount.unwrap_or(match new.kind {
        BatchKind::Monthly => i64::from(total_saturdays) * transport_rate,
        BatchKind::Special => 0,
    });

    validate_saturdays(total_saturdays)?;
    for amount in [default_amount, transport_rate, zoom_single_rate, zoom_family_rate] {
        validate_non_negative(amount)?;
    }

    let now = Utc::now();
    let batch = batch::ActiveModel {
        kind: Set(new.kind),
        name: Set(name),
        description: Set(new
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())),
        default_amount: Set(default_amount),
        total_saturdays: Set(total_saturdays),
        transport_rate: Set(transport_rate),
        zoom_single_rate: Set(zoom_single_rate),
        zoom_family_rate: Set(zoom_family_rate),
        status: Set(BatchStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = batch.insert(db).await?;
    info!("Created {:?} batch {} '{}'", created.kind, created.id, created.name);
    Ok(created)
}

/// Finds a batch by id.
pub async fn get_batch_by_id(db: &DatabaseConnection, batch_id: i64) -> Result<Option<batch::Model>> {
    Batch::find_by_id(batch_id).one(db).await.map_err(Into::into)
}

/// Applies `patch` to a batch. Returns `false` if the batch does not exist.
#[instrument(skip(db, patch))]
pub async fn update_batch(db: &DatabaseConnection, batch_id: i64, patch: BatchPatch) -> Result<bool> {
    let Some(existing) = get_batch_by_id(db, batch_id).await? else {
        return Ok(false);
    };

    let mut batch: batch::ActiveModel = existing.into();
    if let Some(kind) = patch.kind {
        batch.kind = Set(kind);
    }
    if let Some(name) = patch.name {
        batch.name = Set(validate_name(&name)?);
    }
    if let Some(description) = patch.description {
        batch.description = Set(description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()));
    }
    if let Some(total_saturdays) = patch.total_saturdays {
        validate_saturdays(total_saturdays)?;
        batch.total_saturdays = Set(total_saturdays);
    }
    for (value, field) in [
        (patch.default_amount, &mut batch.default_amount),
        (patch.transport_rate, &mut batch.transport_rate),
        (patch.zoom_single_rate, &mut batch.zoom_single_rate),
        (patch.zoom_family_rate, &mut batch.zoom_family_rate),
    ] {
        if let Some(value) = value {
            validate_non_negative(value)?;
            *field = Set(value);
        }
    }
    if let Some(status) = patch.status {
        batch.status = Set(status);
    }
    batch.updated_at = Set(Utc::now());

    batch.update(db).await?;
    Ok(true)
}

/// Deletes a batch and its items, voiding its ledger rows in the same
/// transaction. Returns `false` if the batch does not exist.
#[instrument(skip(db))]
pub async fn delete_batch(db: &DatabaseConnection, batch_id: i64) -> Result<bool> {
    let txn = db.begin().await?;

    if Batch::find_by_id(batch_id).one(&txn).await?.is_none() {
        return Ok(false);
    }

    let voided = void_batch_ledger(&txn, batch_id).await?;
    BatchItem::delete_many()
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .exec(&txn)
        .await?;
    Batch::delete_by_id(batch_id).exec(&txn).await?;

    txn.commit().await?;
    info!("Deleted batch {batch_id}, {voided} ledger rows voided");
    Ok(true)
}

async fn batch_counts(db: &DatabaseConnection, batch_id: Option<i64>) -> Result<HashMap<i64, BatchCounts>> {
    let mut query = Batch::find()
        .select_only()
        .column(batch::Column::Id)
        .column_as(
            Expr::col((batch_item::Entity, batch_item::Column::Id)).count(),
            "total_items",
        )
        .column_as(
            Expr::cust(
                "COALESCE(SUM(CASE WHEN batch_items.transfer_status = 'done' THEN 1 ELSE 0 END), 0)",
            ),
            "transferred_count",
        )
        .column_as(
            Expr::cust(
                "COALESCE(SUM(CASE WHEN batch_items.notify_status = 'sent' THEN 1 ELSE 0 END), 0)",
            ),
            "notified_count",
        )
        .join(JoinType::LeftJoin, batch::Relation::BatchItems.def())
        .group_by(batch::Column::Id);

    if let Some(batch_id) = batch_id {
        query = query.filter(batch::Column::Id.eq(batch_id));
    }

    let counts = query.into_model::<BatchCounts>().all(db).await?;
    Ok(counts.into_iter().map(|c| (c.id, c)).collect())
}

fn summarize(batch: batch::Model, counts: Option<&BatchCounts>) -> BatchSummary {
    BatchSummary {
        batch,
        total_items: counts.map_or(0, |c| c.total_items),
        transferred_count: counts.map_or(0, |c| c.transferred_count),
        notified_count: counts.map_or(0, |c| c.notified_count),
    }
}

/// One batch with its item counts.
pub async fn get_batch_summary(db: &DatabaseConnection, batch_id: i64) -> Result<Option<BatchSummary>> {
    let Some(batch) = get_batch_by_id(db, batch_id).await? else {
        return Ok(None);
    };
    let counts = batch_counts(db, Some(batch_id)).await?;
    Ok(Some(summarize(batch, counts.get(&batch_id))))
}

/// Every batch with its item counts, newest first.
pub async fn get_all_batch_summaries(db: &DatabaseConnection) -> Result<Vec<BatchSummary>> {
    let batches = Batch::find()
        .order_by_desc(batch::Column::CreatedAt)
        .order_by_desc(batch::Column::Id)
        .all(db)
        .await?;
    let counts = batch_counts(db, None).await?;

    Ok(batches
        .into_iter()
        .map(|batch| {
            let batch_counts = counts.get(&batch.id);
            summarize(batch, batch_counts)
        })
        .collect())
}
