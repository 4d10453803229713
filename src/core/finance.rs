//! Finance ledger - user-entered income and expense rows.
//!
//! Rows tagged with a `BATCH-*` reference belong to the ledger sync; users can
//! read them but not create, edit or change their status. Every status change
//! is recorded in the audit trail.

use crate::{
    core::{
        audit::{TRANSACTION_ENTITY, record_audit},
        ledger::is_reserved_reference,
    },
    entities::{FinanceTransaction, TxnStatus, TxnSubType, TxnType, finance_transaction, party},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    Condition, JoinType, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
    prelude::*,
};
use tracing::{info, instrument};

/// Input for [`create_transaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Income or expense
    pub txn_type: TxnType,
    /// Finer classification
    pub sub_type: TxnSubType,
    /// Donor, vendor or other party
    pub party_id: Option<i64>,
    /// Category
    pub category_id: i64,
    /// Account the money moved through
    pub account_id: Option<i64>,
    /// Negative amounts are stored as 0
    pub amount: i64,
    /// Booking date
    pub txn_date: NaiveDate,
    /// Transfer or cash
    pub payment_method: Option<String>,
    /// Destination label used by allocation reports
    pub service_label: Option<String>,
    /// External reference number
    pub reference_no: Option<String>,
    /// Defaults to `pending_approval` for expenses and `posted` for income
    pub status: Option<TxnStatus>,
    /// Free-text notes
    pub notes: Option<String>,
    /// User who entered the row
    pub created_by: Option<i64>,
}

impl NewTransaction {
    /// A transaction with only the required fields set.
    #[must_use]
    pub const fn new(
        txn_type: TxnType,
        sub_type: TxnSubType,
        category_id: i64,
        amount: i64,
        txn_date: NaiveDate,
    ) -> Self {
        Self {
            txn_type,
            sub_type,
            party_id: None,
            category_id,
            account_id: None,
            amount,
            txn_date,
            payment_method: None,
            service_label: None,
            reference_no: None,
            status: None,
            notes: None,
            created_by: None,
        }
    }
}

/// Partial update for [`update_transaction`]. Status changes go through
/// [`void_transaction`], [`approve_transaction`] and [`mark_paid`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    /// Income or expense
    pub txn_type: Option<TxnType>,
    /// Finer classification
    pub sub_type: Option<TxnSubType>,
    /// Donor, vendor or other party
    pub party_id: Option<Option<i64>>,
    /// Category
    pub category_id: Option<i64>,
    /// Account the money moved through
    pub account_id: Option<Option<i64>>,
    /// Amount in rupiah
    pub amount: Option<i64>,
    /// Booking date
    pub txn_date: Option<NaiveDate>,
    /// Transfer or cash
    pub payment_method: Option<Option<String>>,
    /// Destination label used by allocation reports
    pub service_label: Option<Option<String>>,
    /// External reference number
    pub reference_no: Option<Option<String>>,
    /// Free-text notes
    pub notes: Option<Option<String>>,
}

/// Filters for [`list_transactions`]; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Only income or only expense
    pub txn_type: Option<TxnType>,
    /// Only this sub-type
    pub sub_type: Option<TxnSubType>,
    /// Only rows with this status
    pub status: Option<TxnStatus>,
    /// Inclusive lower bound on `txn_date`
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `txn_date`
    pub to: Option<NaiveDate>,
    /// Only rows in this category
    pub category_id: Option<i64>,
    /// Only rows for this party
    pub party_id: Option<i64>,
    /// Substring of the party name, notes or reference number
    pub query: Option<String>,
}

fn reject_reserved(reference: Option<&str>) -> Result<()> {
    match reference {
        Some(reference) if is_reserved_reference(reference) => Err(Error::Validation {
            message: format!("Reference '{reference}' is reserved for batch transfers"),
        }),
        _ => Ok(()),
    }
}

fn reject_sync_owned(existing: &finance_transaction::Model) -> Result<()> {
    if existing.reference_no.as_deref().is_some_and(is_reserved_reference) {
        return Err(Error::Validation {
            message: format!(
                "Transaction {} is maintained by the batch ledger sync",
                existing.id
            ),
        });
    }
    Ok(())
}

/// Creates a ledger row.
#[instrument(skip(db, new))]
pub async fn create_transaction(
    db: &DatabaseConnection,
    new: NewTransaction,
) -> Result<finance_transaction::Model> {
    reject_reserved(new.reference_no.as_deref())?;

    let status = new.status.unwrap_or(match new.txn_type {
        TxnType::Expense => TxnStatus::PendingApproval,
        TxnType::Income => TxnStatus::Posted,
    });

    let now = Utc::now();
    let created = finance_transaction::ActiveModel {
        txn_type: Set(new.txn_type),
        sub_type: Set(new.sub_type),
        party_id: Set(new.party_id),
        category_id: Set(new.category_id),
        account_id: Set(new.account_id),
        amount: Set(new.amount.max(0)),
        txn_date: Set(new.txn_date),
        payment_method: Set(new.payment_method),
        service_label: Set(new.service_label),
        reference_no: Set(new.reference_no),
        status: Set(status),
        notes: Set(new.notes),
        created_by: Set(new.created_by),
        approved_by: Set(None),
        approved_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created {:?} transaction {} ({:?})", created.txn_type, created.id, created.status);
    Ok(created)
}

/// Finds a ledger row by id.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<finance_transaction::Model>> {
    FinanceTransaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Ledger rows matching `filter`, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    filter: &TransactionFilter,
) -> Result<Vec<finance_transaction::Model>> {
    let mut query = FinanceTransaction::find();

    if let Some(txn_type) = filter.txn_type {
        query = query.filter(finance_transaction::Column::TxnType.eq(txn_type));
    }
    if let Some(sub_type) = filter.sub_type {
        query = query.filter(finance_transaction::Column::SubType.eq(sub_type));
    }
    if let Some(status) = filter.status {
        query = query.filter(finance_transaction::Column::Status.eq(status));
    }
    if let Some(from) = filter.from {
        query = query.filter(finance_transaction::Column::TxnDate.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(finance_transaction::Column::TxnDate.lte(to));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(finance_transaction::Column::CategoryId.eq(category_id));
    }
    if let Some(party_id) = filter.party_id {
        query = query.filter(finance_transaction::Column::PartyId.eq(party_id));
    }
    if let Some(text) = filter.query.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        query = query
            .join(JoinType::LeftJoin, finance_transaction::Relation::Party.def())
            .filter(
                Condition::any()
                    .add(party::Column::Name.contains(text))
                    .add(finance_transaction::Column::Notes.contains(text))
                    .add(finance_transaction::Column::ReferenceNo.contains(text)),
            );
    }

    query
        .order_by_desc(finance_transaction::Column::TxnDate)
        .order_by_desc(finance_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies `patch` to a user-entered row. Returns `false` if it does not exist.
#[instrument(skip(db, patch))]
pub async fn update_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
    patch: TransactionPatch,
) -> Result<bool> {
    let Some(existing) = get_transaction_by_id(db, transaction_id).await? else {
        return Ok(false);
    };
    reject_sync_owned(&existing)?;
    if let Some(reference) = &patch.reference_no {
        reject_reserved(reference.as_deref())?;
    }

    let mut row: finance_transaction::ActiveModel = existing.into();
    if let Some(txn_type) = patch.txn_type {
        row.txn_type = Set(txn_type);
    }
    if let Some(sub_type) = patch.sub_type {
        row.sub_type = Set(sub_type);
    }
    if let Some(party_id) = patch.party_id {
        row.party_id = Set(party_id);
    }
    if let Some(category_id) = patch.category_id {
        row.category_id = Set(category_id);
    }
    if let Some(account_id) = patch.account_id {
        row.account_id = Set(account_id);
    }
    if let Some(amount) = patch.amount {
        row.amount = Set(amount.max(0));
    }
    if let Some(txn_date) = patch.txn_date {
        row.txn_date = Set(txn_date);
    }
    if let Some(payment_method) = patch.payment_method {
        row.payment_method = Set(payment_method);
    }
    if let Some(service_label) = patch.service_label {
        row.service_label = Set(service_label);
    }
    if let Some(reference_no) = patch.reference_no {
        row.reference_no = Set(reference_no);
    }
    if let Some(notes) = patch.notes {
        row.notes = Set(notes);
    }
    row.updated_at = Set(Utc::now());

    row.update(db).await?;
    Ok(true)
}

/// Loads a user-entered row, applies `change` and records the audit entry,
/// all in one transaction.
async fn change_status<F>(
    db: &DatabaseConnection,
    transaction_id: i64,
    actor_id: Option<i64>,
    action: &str,
    change: F,
) -> Result<bool>
where
    F: FnOnce(&finance_transaction::Model, &mut finance_transaction::ActiveModel) + Send,
{
    let txn = db.begin().await?;

    let Some(existing) = FinanceTransaction::find_by_id(transaction_id).one(&txn).await? else {
        return Ok(false);
    };
    reject_sync_owned(&existing)?;

    let mut row: finance_transaction::ActiveModel = existing.clone().into();
    change(&existing, &mut row);
    row.updated_at = Set(Utc::now());
    let updated = row.update(&txn).await?;

    record_audit(
        &txn,
        actor_id,
        TRANSACTION_ENTITY,
        transaction_id,
        action,
        Some(&existing),
        Some(&updated),
    )
    .await?;

    txn.commit().await?;
    info!("Transaction {transaction_id}: {action}");
    Ok(true)
}

/// Voids a row. Returns `false` if it does not exist.
pub async fn void_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
    actor_id: Option<i64>,
) -> Result<bool> {
    change_status(db, transaction_id, actor_id, "void", |_, row| {
        row.status = Set(TxnStatus::Void);
    })
    .await
}

/// Approves a row, stamping the approver and time and appending
/// `[APPROVAL <time>]: <note>` to its notes when a note is given.
pub async fn approve_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
    approved_by: Option<i64>,
    note: Option<&str>,
) -> Result<bool> {
    let now = Utc::now();
    let note_line = note
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| format!("[APPROVAL {}]: {n}", now.format("%d/%m/%Y, %H.%M.%S")));

    change_status(db, transaction_id, approved_by, "approve", move |existing, row| {
        row.status = Set(TxnStatus::Approved);
        row.approved_by = Set(approved_by);
        row.approved_at = Set(Some(now));
        if let Some(line) = note_line {
            let notes = match existing.notes.as_deref().filter(|n| !n.is_empty()) {
                Some(notes) => format!("{notes}\n{line}"),
                None => line,
            };
            row.notes = Set(Some(notes));
        }
    })
    .await
}

/// Marks a row as paid (`posted`). Returns `false` if it does not exist.
pub async fn mark_paid(
    db: &DatabaseConnection,
    transaction_id: i64,
    actor_id: Option<i64>,
) -> Result<bool> {
    change_status(db, transaction_id, actor_id, "mark_paid", |_, row| {
        row.status = Set(TxnStatus::Posted);
    })
    .await
}
