//! Party entity - counterparty of a ledger row (member, donor, vendor).

use super::sea_orm_active_enums::PartyType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Party database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parties")]
pub struct Model {
    /// Unique identifier for the party
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Member, donor, vendor or other
    pub party_type: PartyType,
    /// Contact handle
    pub whatsapp: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Soft delete flag
    pub is_active: bool,
    /// When the party was created
    pub created_at: DateTimeUtc,
    /// When the party was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Party and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One party appears on many transactions
    #[sea_orm(has_many = "super::finance_transaction::Entity")]
    Transactions,
}

impl Related<super::finance_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
