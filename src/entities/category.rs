//! Category entity - classification for ledger rows.
//!
//! `(kind, name)` is unique; the ledger sync looks categories up by exact name
//! and creates them on first use.

use super::sea_orm_active_enums::TxnType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, matched case-sensitively
    pub name: String,
    /// Income or expense
    pub kind: TxnType,
    /// Optional parent category
    pub parent_id: Option<i64>,
    /// Soft delete flag
    pub is_active: bool,
    /// When the category was created
    pub created_at: DateTimeUtc,
    /// When the category was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Optional parent category
    #[sea_orm(belongs_to = "Entity", from = "Column::ParentId", to = "Column::Id")]
    Parent,
    /// One category classifies many transactions
    #[sea_orm(has_many = "super::finance_transaction::Entity")]
    Transactions,
}

impl Related<super::finance_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
