//! Recipient entity - a person who receives disbursements.
//!
//! A recipient may point at another recipient through `transfer_to_id`; in that
//! case the money goes to the referenced recipient's bank account. Recipients
//! sharing a `family_group_id` receive the family zoom allowance instead of the
//! single one.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recipient database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recipients")]
pub struct Model {
    /// Unique identifier for the recipient
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Bank or e-wallet provider
    pub bank_name: Option<String>,
    /// Account number at `bank_name`
    pub account_number: Option<String>,
    /// Contact handle used for payment notifications
    pub whatsapp: Option<String>,
    /// Free-text note
    pub note: Option<String>,
    /// Recipient whose account actually receives this recipient's money
    pub transfer_to_id: Option<i64>,
    /// Shared label for recipients that get the family zoom allowance
    pub family_group_id: Option<i64>,
    /// Whether the recipient gets any zoom allowance when a batch is populated
    pub zoom_eligible: bool,
    /// Soft delete flag - inactive recipients are skipped by listings and populate
    pub is_active: bool,
    /// When the recipient was created
    pub created_at: DateTimeUtc,
    /// When the recipient was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Recipient and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One-hop payee indirection
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::TransferToId",
        to = "Column::Id"
    )]
    TransferTo,
    /// One recipient appears in many batches
    #[sea_orm(has_many = "super::batch_item::Entity")]
    BatchItems,
}

impl Related<super::batch_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
