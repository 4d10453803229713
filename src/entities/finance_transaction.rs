//! Finance transaction entity - one row of the income/expense ledger.
//!
//! Rows entered by users carry an arbitrary (or no) `reference_no`. Rows owned
//! by the batch ledger sync are tagged `BATCH-{id}` / `BATCH-{id}-FEE` and their
//! notes start with `[AUTO_BATCH_TRANSFER]`.

use super::sea_orm_active_enums::{TxnStatus, TxnSubType, TxnType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Finance transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Income or expense
    #[sea_orm(column_name = "type")]
    pub txn_type: TxnType,
    /// Tithe, offering, other income or expense
    pub sub_type: TxnSubType,
    /// Optional counterparty
    pub party_id: Option<i64>,
    /// Category
    pub category_id: i64,
    /// Optional money account
    pub account_id: Option<i64>,
    /// Amount in whole currency units, never negative
    pub amount: i64,
    /// Booking date
    pub txn_date: Date,
    /// Free-form payment method label
    pub payment_method: Option<String>,
    /// Destination/service label used by the allocation report
    pub service_label: Option<String>,
    /// External reference; idempotency key for machine-generated rows
    pub reference_no: Option<String>,
    /// Draft, pending approval, approved, posted or void
    pub status: TxnStatus,
    /// Free-text notes
    pub notes: Option<String>,
    /// Actor who entered the row
    pub created_by: Option<i64>,
    /// Actor who approved the row
    pub approved_by: Option<i64>,
    /// When the row was approved
    pub approved_at: Option<DateTimeUtc>,
    /// When the row was created
    pub created_at: DateTimeUtc,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `FinanceTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction has one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// Optional counterparty
    #[sea_orm(
        belongs_to = "super::party::Entity",
        from = "Column::PartyId",
        to = "super::party::Column::Id"
    )]
    Party,
    /// Optional money account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::party::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Party.def()
    }
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
