//! Batch entity - one round of payments to recipients.
//!
//! Monthly batches carry the rates used to compute each item's amount from
//! attendance; special batches pay `default_amount` to every item.

use super::sea_orm_active_enums::{BatchKind, BatchStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    /// Unique identifier for the batch
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Monthly (attendance based) or special (fixed amount)
    #[sea_orm(column_name = "type")]
    pub kind: BatchKind,
    /// Batch name, conventionally `"Transfer <Month Year>"`
    pub name: String,
    /// Optional description, used in ledger labels and proof filenames
    pub description: Option<String>,
    /// Fixed per-item amount for special batches
    pub default_amount: i64,
    /// Number of Saturdays in the period; upper bound for attendance
    pub total_saturdays: i32,
    /// Amount paid per attended Saturday
    pub transport_rate: i64,
    /// Zoom allowance for a single recipient
    pub zoom_single_rate: i64,
    /// Zoom allowance for a family-group member
    pub zoom_family_rate: i64,
    /// Active or completed
    pub status: BatchStatus,
    /// When the batch was created
    pub created_at: DateTimeUtc,
    /// When the batch was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Batch and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One batch has many items
    #[sea_orm(has_many = "super::batch_item::Entity")]
    BatchItems,
}

impl Related<super::batch_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
