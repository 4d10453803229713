//! Batch item entity - one recipient's payment within one batch.
//!
//! The `(batch_id, recipient_id)` pair is unique. `transfer_proof` holds an
//! opaque filename owned by the proof store and is never returned by list
//! queries.

use super::sea_orm_active_enums::{NotifyStatus, PaymentMethod, TransferStatus, ZoomType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batch_items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning batch
    pub batch_id: i64,
    /// Recipient being paid
    pub recipient_id: i64,
    /// Amount to pay in whole currency units
    pub amount: i64,
    /// Transfer or cash
    pub payment_method: PaymentMethod,
    /// Saturdays attended in the batch period
    pub saturdays_attended: i32,
    /// Zoom allowance applied to the amount
    pub zoom_type: ZoomType,
    /// Bank fee paid for the transfer; always 0 for cash
    pub transfer_fee: i64,
    /// Pending or done
    pub transfer_status: TransferStatus,
    /// Pending, sent or skipped
    pub notify_status: NotifyStatus,
    /// When the transfer was marked done
    pub transfer_at: Option<DateTimeUtc>,
    /// When the notification was sent
    pub notified_at: Option<DateTimeUtc>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Proof image filename in the proof store
    pub transfer_proof: Option<String>,
    /// When the item was created
    pub created_at: DateTimeUtc,
    /// When the item was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `BatchItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one batch; deleting the batch deletes its items
    #[sea_orm(
        belongs_to = "super::batch::Entity",
        from = "Column::BatchId",
        to = "super::batch::Column::Id",
        on_delete = "Cascade"
    )]
    Batch,
    /// Each item pays one recipient
    #[sea_orm(
        belongs_to = "super::recipient::Entity",
        from = "Column::RecipientId",
        to = "super::recipient::Column::Id"
    )]
    Recipient,
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl Related<super::recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
