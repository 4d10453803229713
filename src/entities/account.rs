//! Account entity - where money is held (cash box, bank, e-wallet).

use super::sea_orm_active_enums::AccountType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Cash, bank, e-wallet or other
    pub account_type: AccountType,
    /// Bank name for bank accounts
    pub bank_name: Option<String>,
    /// Account number
    pub account_number: Option<String>,
    /// Name of the account holder
    pub holder_name: Option<String>,
    /// Balance when tracking started, never negative
    pub opening_balance: i64,
    /// Soft delete flag
    pub is_active: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the account was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account appears on many transactions
    #[sea_orm(has_many = "super::finance_transaction::Entity")]
    Transactions,
}

impl Related<super::finance_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
