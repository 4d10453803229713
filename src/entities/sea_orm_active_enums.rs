//! Closed string sets stored as text columns.
//!
//! Every enum here maps one-to-one onto the lowercase values persisted in
//! `SQLite`, so rows written by earlier versions of the schema decode unchanged.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether a batch derives amounts from attendance or pays a fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// Amount = attendance * transport rate + zoom allowance
    #[sea_orm(string_value = "monthly")]
    Monthly,
    /// Every item receives the batch's default amount
    #[sea_orm(string_value = "special")]
    Special,
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Still being worked on
    #[sea_orm(string_value = "active")]
    Active,
    /// Closed by an operator
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// How a batch item is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank or e-wallet transfer; contributes to the batch ledger rows
    #[sea_orm(string_value = "transfer")]
    Transfer,
    /// Handed over in cash; never carries a fee or proof image
    #[sea_orm(string_value = "cash")]
    Cash,
}

impl PaymentMethod {
    /// Lenient parse used for legacy data: anything other than `cash` is a transfer.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("cash") {
            Self::Cash
        } else {
            Self::Transfer
        }
    }
}

/// Which zoom allowance a recipient receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ZoomType {
    /// No allowance
    #[sea_orm(string_value = "none")]
    None,
    /// Individual allowance
    #[sea_orm(string_value = "single")]
    Single,
    /// Per-member allowance for recipients sharing a family group
    #[sea_orm(string_value = "family")]
    Family,
}

/// Whether the money for an item has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Not sent yet
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Sent
    #[sea_orm(string_value = "done")]
    Done,
}

/// Whether the recipient has been told about the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum NotifyStatus {
    /// Not notified yet
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Message sent
    #[sea_orm(string_value = "sent")]
    Sent,
    /// Deliberately not notified
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

/// Direction of a ledger row; also the kind of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TxnType {
    /// Money received
    #[sea_orm(string_value = "income")]
    Income,
    /// Money spent
    #[sea_orm(string_value = "expense")]
    Expense,
}

/// Finer classification of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TxnSubType {
    /// Tithe income
    #[sea_orm(string_value = "tithe")]
    Tithe,
    /// Offering income
    #[sea_orm(string_value = "offering")]
    Offering,
    /// Any other income
    #[sea_orm(string_value = "other_income")]
    OtherIncome,
    /// Expense
    #[sea_orm(string_value = "expense")]
    Expense,
}

impl TxnSubType {
    /// The stored string value, used as a grouping key in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tithe => "tithe",
            Self::Offering => "offering",
            Self::OtherIncome => "other_income",
            Self::Expense => "expense",
        }
    }
}

/// Approval/posting state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TxnStatus {
    /// Saved but not submitted
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Waiting for an approver
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    /// Approved, not yet paid
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Booked
    #[sea_orm(string_value = "posted")]
    Posted,
    /// Cancelled; excluded from every report
    #[sea_orm(string_value = "void")]
    Void,
}

/// Kind of counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    /// Congregation member
    #[sea_orm(string_value = "member")]
    Member,
    /// External donor
    #[sea_orm(string_value = "donor")]
    Donor,
    /// Supplier
    #[sea_orm(string_value = "vendor")]
    Vendor,
    /// Anything else
    #[sea_orm(string_value = "other")]
    Other,
}

/// Kind of money account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Petty cash
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Bank account
    #[sea_orm(string_value = "bank")]
    Bank,
    /// E-wallet
    #[sea_orm(string_value = "ewallet")]
    Ewallet,
    /// Anything else
    #[sea_orm(string_value = "other")]
    Other,
}
