//! Ledger sync - mirrors completed batch transfers into the expense ledger.
//!
//! Each batch owns at most two machine-generated ledger rows, found by their
//! reference tag:
//!
//! * `BATCH-{id}` - the sum of all transfer items marked done
//! * `BATCH-{id}-FEE` - the sum of their transfer fees
//!
//! [`sync_batch_ledger`] recomputes both from the current item state and
//! updates the rows in place, inserts them, or voids them. Running it again
//! without an item change writes nothing. Cash items never contribute.
//!
//! Callers run the sync inside the same database transaction as the item
//! mutation that triggered it, so an item change is never visible without
//! its ledger update.

use crate::{
    core::{
        audit::{TRANSACTION_ENTITY, record_audit},
        category::ensure_category,
    },
    entities::{
        Batch, BatchItem, FinanceTransaction, PaymentMethod, TransferStatus, TxnStatus,
        TxnSubType, TxnType, batch, batch_item, finance_transaction,
    },
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
};
use tracing::{debug, info, instrument};

/// Marker at the start of the notes of every machine-generated row
pub const AUTO_NOTE_MARKER: &str = "[AUTO_BATCH_TRANSFER]";

/// Expense category for the disbursed amount
pub const AMOUNT_CATEGORY: &str = "Bantuan Sosial";

/// Expense category for transfer fees
pub const FEE_CATEGORY: &str = "Biaya Transfer Bank";

/// Payment method written on machine-generated rows
const LEDGER_PAYMENT_METHOD: &str = "transfer";

/// Prefix shared by every reference tag owned by the sync
const RESERVED_REFERENCE_PREFIX: &str = "BATCH-";

/// Reference tag of a batch's amount row.
#[must_use]
pub fn amount_reference(batch_id: i64) -> String {
    format!("BATCH-{batch_id}")
}

/// Reference tag of a batch's fee row.
#[must_use]
pub fn fee_reference(batch_id: i64) -> String {
    format!("BATCH-{batch_id}-FEE")
}

/// Reference tag of the per-item rows written by older versions.
#[must_use]
pub fn legacy_item_reference(item_id: i64) -> String {
    format!("BATCH-ITEM-{item_id}")
}

/// Whether `reference` belongs to the sync and may not be written by users.
#[must_use]
pub fn is_reserved_reference(reference: &str) -> bool {
    reference
        .trim()
        .to_ascii_uppercase()
        .starts_with(RESERVED_REFERENCE_PREFIX)
}

/// The batch name without a leading `"Transfer "`, compared case-insensitively.
#[must_use]
pub fn month_label(batch_name: &str) -> String {
    let name = batch_name.trim();
    let stripped = name
        .get(..8)
        .filter(|prefix| prefix.eq_ignore_ascii_case("transfer"))
        .and_then(|_| name.get(8..))
        .filter(|rest| rest.starts_with(char::is_whitespace));
    stripped.map_or(name, str::trim_start).to_string()
}

/// Service label of the amount row: category, description and month label.
#[must_use]
pub fn amount_label(batch_name: &str, description: Option<&str>) -> String {
    let month = month_label(batch_name);
    [Some(AMOUNT_CATEGORY), description.map(str::trim), Some(month.as_str())]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Service label of the fee row.
#[must_use]
pub fn fee_label(batch_name: &str, description: Option<&str>) -> String {
    format!("{FEE_CATEGORY} • {}", amount_label(batch_name, description))
}

fn batch_display_name(batch: &batch::Model) -> String {
    let name = batch.name.trim();
    if name.is_empty() {
        format!("#{}", batch.id)
    } else {
        name.to_string()
    }
}

/// Totals over a batch's done transfer items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTransferTotals {
    /// Sum of item amounts
    pub total_amount: i64,
    /// Sum of transfer fees
    pub total_fee: i64,
    /// Number of done items
    pub done_count: i64,
    /// Latest `transfer_at` among the counted items
    pub latest_transfer_at: Option<DateTime<Utc>>,
}

/// Sums the done transfer items of a batch. Cash items are skipped.
pub async fn aggregate_batch_transfers<C: ConnectionTrait>(
    conn: &C,
    batch_id: i64,
) -> Result<BatchTransferTotals> {
    let items = BatchItem::find()
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .filter(batch_item::Column::TransferStatus.eq(TransferStatus::Done))
        .filter(batch_item::Column::PaymentMethod.eq(PaymentMethod::Transfer))
        .all(conn)
        .await?;

    Ok(items.iter().fold(
        BatchTransferTotals {
            total_amount: 0,
            total_fee: 0,
            done_count: 0,
            latest_transfer_at: None,
        },
        |mut totals, item| {
            totals.total_amount += item.amount;
            totals.total_fee += item.transfer_fee;
            totals.done_count += 1;
            totals.latest_transfer_at = totals.latest_transfer_at.max(item.transfer_at);
            totals
        },
    ))
}

/// What a sync did to one ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    /// No row exists and none was needed
    Absent,
    /// A new posted row was inserted
    Created(i64),
    /// The existing row was rewritten
    Updated(i64),
    /// The existing row already matched
    Unchanged(i64),
    /// The existing row was voided
    Voided(i64),
}

impl RowAction {
    /// Id of the row touched or inspected, if any.
    #[must_use]
    pub const fn row_id(self) -> Option<i64> {
        match self {
            Self::Absent => None,
            Self::Created(id) | Self::Updated(id) | Self::Unchanged(id) | Self::Voided(id) => {
                Some(id)
            }
        }
    }

    /// Whether the sync wrote to the row.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Created(_) | Self::Updated(_) | Self::Voided(_))
    }
}

/// Result of one [`sync_batch_ledger`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Owning batch
    pub batch_id: i64,
    /// Totals the rows were derived from
    pub totals: BatchTransferTotals,
    /// What happened to the `BATCH-{id}` row
    pub amount_row: RowAction,
    /// What happened to the `BATCH-{id}-FEE` row
    pub fee_row: RowAction,
    /// Legacy per-item rows voided by this call
    pub legacy_voided: u64,
}

/// Desired content of one machine-generated row.
struct DesiredRow<'a> {
    reference: String,
    category: &'a str,
    amount: i64,
    txn_date: NaiveDate,
    label: String,
    notes: String,
}

/// Brings the `BATCH-{id}` and `BATCH-{id}-FEE` rows in line with the batch's items.
///
/// A batch that no longer exists is a no-op and yields `Ok(None)`.
#[instrument(skip(conn))]
pub async fn sync_batch_ledger<C: ConnectionTrait>(
    conn: &C,
    batch_id: i64,
) -> Result<Option<SyncOutcome>> {
    let Some(batch) = Batch::find_by_id(batch_id).one(conn).await? else {
        debug!("Batch {batch_id} not found, nothing to sync");
        return Ok(None);
    };

    let totals = aggregate_batch_transfers(conn, batch_id).await?;
    let legacy_voided = void_legacy_item_rows(conn, batch_id).await?;

    let (amount_row, fee_row) = if totals.done_count == 0 || totals.total_amount <= 0 {
        (
            void_row(conn, &amount_reference(batch_id)).await?,
            void_row(conn, &fee_reference(batch_id)).await?,
        )
    } else {
        let txn_date = totals
            .latest_transfer_at
            .unwrap_or_else(Utc::now)
            .date_naive();
        let name = batch_display_name(&batch);
        let description = batch.description.as_deref();

        let amount_desired = DesiredRow {
            reference: amount_reference(batch_id),
            category: AMOUNT_CATEGORY,
            amount: totals.total_amount,
            txn_date,
            label: amount_label(&batch.name, description),
            notes: format!(
                "{AUTO_NOTE_MARKER} {} transfer pada batch {name}",
                totals.done_count
            ),
        };
        let fee_desired = DesiredRow {
            reference: fee_reference(batch_id),
            category: FEE_CATEGORY,
            amount: totals.total_fee,
            txn_date,
            label: fee_label(&batch.name, description),
            notes: format!(
                "{AUTO_NOTE_MARKER} Biaya transfer {} transaksi pada batch {name}",
                totals.done_count
            ),
        };

        (
            upsert_row(conn, amount_desired).await?,
            upsert_row(conn, fee_desired).await?,
        )
    };

    if amount_row.is_write() || fee_row.is_write() || legacy_voided > 0 {
        info!(
            "Synced ledger for batch {batch_id}: amount {amount_row:?}, fee {fee_row:?}, \
             {legacy_voided} legacy rows voided"
        );
    } else {
        debug!("Ledger for batch {batch_id} already up to date");
    }

    Ok(Some(SyncOutcome {
        batch_id,
        totals,
        amount_row,
        fee_row,
        legacy_voided,
    }))
}

/// Latest row carrying `reference`.
async fn find_by_reference<C: ConnectionTrait>(
    conn: &C,
    reference: &str,
) -> Result<Option<finance_transaction::Model>> {
    FinanceTransaction::find()
        .filter(finance_transaction::Column::ReferenceNo.eq(reference))
        .order_by_desc(finance_transaction::Column::Id)
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Voids the row for `reference` unless it is missing or already void.
async fn void_row<C: ConnectionTrait>(conn: &C, reference: &str) -> Result<RowAction> {
    let Some(existing) = find_by_reference(conn, reference).await? else {
        return Ok(RowAction::Absent);
    };
    if existing.status == TxnStatus::Void {
        return Ok(RowAction::Unchanged(existing.id));
    }

    let id = existing.id;
    let mut row: finance_transaction::ActiveModel = existing.clone().into();
    row.status = Set(TxnStatus::Void);
    row.updated_at = Set(Utc::now());
    let voided = row.update(conn).await?;

    record_audit(conn, None, TRANSACTION_ENTITY, id, "void", Some(&existing), Some(&voided)).await?;
    Ok(RowAction::Voided(id))
}

fn row_matches(existing: &finance_transaction::Model, desired: &DesiredRow<'_>, category_id: i64) -> bool {
    existing.txn_type == TxnType::Expense
        && existing.sub_type == TxnSubType::Expense
        && existing.category_id == category_id
        && existing.amount == desired.amount
        && existing.txn_date == desired.txn_date
        && existing.payment_method.as_deref() == Some(LEDGER_PAYMENT_METHOD)
        && existing.service_label.as_deref() == Some(desired.label.as_str())
        && existing.notes.as_deref() == Some(desired.notes.as_str())
        && existing.status == TxnStatus::Posted
}

/// Updates, inserts or voids the row for `desired.reference`.
async fn upsert_row<C: ConnectionTrait>(conn: &C, desired: DesiredRow<'_>) -> Result<RowAction> {
    let existing = find_by_reference(conn, &desired.reference).await?;

    if desired.amount <= 0 {
        return match existing {
            Some(_) => void_row(conn, &desired.reference).await,
            None => Ok(RowAction::Absent),
        };
    }

    let category_id = ensure_category(conn, TxnType::Expense, desired.category).await?;
    let now = Utc::now();

    match existing {
        Some(existing) if row_matches(&existing, &desired, category_id) => {
            Ok(RowAction::Unchanged(existing.id))
        }
        Some(existing) => {
            let id = existing.id;
            let mut row: finance_transaction::ActiveModel = existing.clone().into();
            row.txn_type = Set(TxnType::Expense);
            row.sub_type = Set(TxnSubType::Expense);
            row.category_id = Set(category_id);
            row.amount = Set(desired.amount);
            row.txn_date = Set(desired.txn_date);
            row.payment_method = Set(Some(LEDGER_PAYMENT_METHOD.to_string()));
            row.service_label = Set(Some(desired.label));
            row.notes = Set(Some(desired.notes));
            row.status = Set(TxnStatus::Posted);
            row.updated_at = Set(now);
            let updated = row.update(conn).await?;

            if existing.status != TxnStatus::Posted {
                record_audit(
                    conn,
                    None,
                    TRANSACTION_ENTITY,
                    id,
                    "sync_repost",
                    Some(&existing),
                    Some(&updated),
                )
                .await?;
            }
            Ok(RowAction::Updated(id))
        }
        None => {
            let created = finance_transaction::ActiveModel {
                txn_type: Set(TxnType::Expense),
                sub_type: Set(TxnSubType::Expense),
                party_id: Set(None),
                category_id: Set(category_id),
                account_id: Set(None),
                amount: Set(desired.amount),
                txn_date: Set(desired.txn_date),
                payment_method: Set(Some(LEDGER_PAYMENT_METHOD.to_string())),
                service_label: Set(Some(desired.label)),
                reference_no: Set(Some(desired.reference)),
                status: Set(TxnStatus::Posted),
                notes: Set(Some(desired.notes)),
                created_by: Set(None),
                approved_by: Set(None),
                approved_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await?;

            record_audit::<_, (), _>(
                conn,
                None,
                TRANSACTION_ENTITY,
                created.id,
                "sync_create",
                None,
                Some(&created),
            )
            .await?;
            Ok(RowAction::Created(created.id))
        }
    }
}

/// Voids the per-item rows older versions wrote for this batch's items.
async fn void_legacy_item_rows<C: ConnectionTrait>(conn: &C, batch_id: i64) -> Result<u64> {
    let item_ids: Vec<i64> = BatchItem::find()
        .select_only()
        .column(batch_item::Column::Id)
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .into_tuple()
        .all(conn)
        .await?;
    if item_ids.is_empty() {
        return Ok(0);
    }

    let references: Vec<String> = item_ids.into_iter().map(legacy_item_reference).collect();
    let result = FinanceTransaction::update_many()
        .set(finance_transaction::ActiveModel {
            status: Set(TxnStatus::Void),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(finance_transaction::Column::ReferenceNo.is_in(references))
        .filter(finance_transaction::Column::Status.ne(TxnStatus::Void))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Voids both ledger rows of a batch and its legacy per-item rows.
///
/// Used when a batch is deleted. Returns the number of rows voided.
pub async fn void_batch_ledger<C: ConnectionTrait>(conn: &C, batch_id: i64) -> Result<u64> {
    let mut voided = void_legacy_item_rows(conn, batch_id).await?;
    for reference in [amount_reference(batch_id), fee_reference(batch_id)] {
        if matches!(void_row(conn, &reference).await?, RowAction::Voided(_)) {
            voided += 1;
        }
    }
    Ok(voided)
}

/// Syncs one batch in its own transaction.
pub async fn sync_batch(db: &DatabaseConnection, batch_id: i64) -> Result<Option<SyncOutcome>> {
    let txn = db.begin().await?;
    let outcome = sync_batch_ledger(&txn, batch_id).await?;
    txn.commit().await?;
    Ok(outcome)
}

/// Syncs every batch, one transaction per batch. Returns the outcomes in id order.
pub async fn sync_all_batches(db: &DatabaseConnection) -> Result<Vec<SyncOutcome>> {
    let batch_ids: Vec<i64> = Batch::find()
        .select_only()
        .column(batch::Column::Id)
        .order_by_asc(batch::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let mut outcomes = Vec::with_capacity(batch_ids.len());
    for batch_id in batch_ids {
        if let Some(outcome) = sync_batch(db, batch_id).await? {
            outcomes.push(outcome);
        }
    }

    let written = outcomes
        .iter()
        .filter(|o| o.amount_row.is_write() || o.fee_row.is_write() || o.legacy_voided > 0)
        .count();
    info!("Ledger sync for {} batches, {written} changed", outcomes.len());
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::batch_item::{BatchItemPatch, delete_batch_item, update_batch_item};
    use crate::entities::Category;
    use crate::test_utils::{
        create_test_batch, create_test_item, create_test_recipient, ledger_row, setup_test_db,
    };
    use chrono::TimeZone;
    use sea_orm::PaginatorTrait;

    fn mark_done(fee: i64) -> BatchItemPatch {
        BatchItemPatch {
            transfer_status: Some(TransferStatus::Done),
            transfer_fee: Some(fee),
            ..Default::default()
        }
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label("Transfer Januari 2025"), "Januari 2025");
        assert_eq!(month_label("TRANSFER   Maret"), "Maret");
        assert_eq!(month_label("transfer\tApril"), "April");
        assert_eq!(month_label("Transferan Mei"), "Transferan Mei");
        assert_eq!(month_label("Bantuan Natal"), "Bantuan Natal");
        assert_eq!(month_label("Transfer"), "Transfer");
        assert_eq!(month_label("Trans"), "Trans");
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            amount_label("Transfer Januari 2025", Some("Transport Lansia")),
            "Bantuan Sosial Transport Lansia Januari 2025"
        );
        assert_eq!(amount_label("Transfer Januari", None), "Bantuan Sosial Januari");
        assert_eq!(amount_label("Transfer Januari", Some("  ")), "Bantuan Sosial Januari");
        assert_eq!(
            fee_label("Transfer Januari", None),
            "Biaya Transfer Bank • Bantuan Sosial Januari"
        );
    }

    #[test]
    fn test_reserved_references() {
        assert_eq!(amount_reference(7), "BATCH-7");
        assert_eq!(fee_reference(7), "BATCH-7-FEE");
        assert_eq!(legacy_item_reference(3), "BATCH-ITEM-3");
        assert!(is_reserved_reference("BATCH-7"));
        assert!(is_reserved_reference(" batch-7-fee"));
        assert!(!is_reserved_reference("INV-2025-001"));
        assert!(!is_reserved_reference("BATCH7"));
    }

    #[tokio::test]
    async fn test_sync_missing_batch_is_noop() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(sync_batch(&db, 404).await?.is_none());
        assert_eq!(FinanceTransaction::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_without_done_items_writes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer Januari").await?;
        let recipient = create_test_recipient(&db, "Ani").await?;
        create_test_item(&db, batch.id, recipient.id, 3).await?;

        let outcome = sync_batch(&db, batch.id).await?.unwrap();
        assert_eq!(outcome.amount_row, RowAction::Absent);
        assert_eq!(outcome.fee_row, RowAction::Absent);
        assert_eq!(FinanceTransaction::find().count(&db).await?, 0);
        // Categories are only created when a row is written
        assert_eq!(Category::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_scenario_done_then_deleted() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer Januari 2025").await?;
        let recipient = create_test_recipient(&db, "Ani").await?;
        let item = create_test_item(&db, batch.id, recipient.id, 3).await?;
        assert_eq!(item.amount, 125_000);

        update_batch_item(&db, item.id, mark_done(2_000)).await?.unwrap();

        let amount_row = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(amount_row.amount, 125_000);
        assert_eq!(amount_row.status, TxnStatus::Posted);
        assert_eq!(amount_row.txn_type, TxnType::Expense);
        assert_eq!(
            amount_row.service_label.as_deref(),
            Some("Bantuan Sosial Januari 2025")
        );
        assert_eq!(
            amount_row.notes.as_deref(),
            Some("[AUTO_BATCH_TRANSFER] 1 transfer pada batch Transfer Januari 2025")
        );

        let fee_row = ledger_row(&db, &fee_reference(batch.id)).await?.unwrap();
        assert_eq!(fee_row.amount, 2_000);
        assert_eq!(fee_row.status, TxnStatus::Posted);
        assert_ne!(fee_row.category_id, amount_row.category_id);

        assert!(delete_batch_item(&db, item.id).await?);

        let amount_row = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        let fee_row = ledger_row(&db, &fee_reference(batch.id)).await?.unwrap();
        assert_eq!(amount_row.status, TxnStatus::Void);
        assert_eq!(fee_row.status, TxnStatus::Void);
        assert_eq!(FinanceTransaction::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer Februari").await?;
        let recipient = create_test_recipient(&db, "Budi").await?;
        let item = create_test_item(&db, batch.id, recipient.id, 4).await?;
        update_batch_item(&db, item.id, mark_done(2_500)).await?;

        let before = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        let before_fee = ledger_row(&db, &fee_reference(batch.id)).await?.unwrap();

        let first = sync_batch(&db, batch.id).await?.unwrap();
        let second = sync_batch(&db, batch.id).await?.unwrap();
        assert_eq!(first.amount_row, RowAction::Unchanged(before.id));
        assert_eq!(second.fee_row, RowAction::Unchanged(before_fee.id));

        assert_eq!(ledger_row(&db, &amount_reference(batch.id)).await?.unwrap(), before);
        assert_eq!(ledger_row(&db, &fee_reference(batch.id)).await?.unwrap(), before_fee);
        assert_eq!(FinanceTransaction::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_amount_tracks_done_items() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer Maret").await?;
        let ani = create_test_recipient(&db, "Ani").await?;
        let budi = create_test_recipient(&db, "Budi").await?;
        let first = create_test_item(&db, batch.id, ani.id, 4).await?;
        let second = create_test_item(&db, batch.id, budi.id, 2).await?;

        update_batch_item(&db, first.id, mark_done(1_000)).await?;
        let row = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(row.amount, 150_000);

        update_batch_item(&db, second.id, mark_done(1_000)).await?;
        let grown = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(grown.id, row.id);
        assert_eq!(grown.amount, 150_000 + 100_000);
        assert_eq!(
            ledger_row(&db, &fee_reference(batch.id)).await?.unwrap().amount,
            2_000
        );

        let revert = BatchItemPatch {
            transfer_status: Some(TransferStatus::Pending),
            ..Default::default()
        };
        update_batch_item(&db, second.id, revert.clone()).await?;
        let shrunk = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(shrunk.amount, 150_000);
        assert_eq!(shrunk.status, TxnStatus::Posted);

        update_batch_item(&db, first.id, revert).await?;
        let voided = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(voided.status, TxnStatus::Void);
        assert_eq!(
            ledger_row(&db, &fee_reference(batch.id)).await?.unwrap().status,
            TxnStatus::Void
        );

        // Marking done again revives the same row
        update_batch_item(&db, first.id, mark_done(0)).await?;
        let revived = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(revived.id, row.id);
        assert_eq!(revived.status, TxnStatus::Posted);
        // Zero fee keeps the fee row void
        assert_eq!(
            ledger_row(&db, &fee_reference(batch.id)).await?.unwrap().status,
            TxnStatus::Void
        );
        assert_eq!(FinanceTransaction::find().count(&db).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_cash_items_are_excluded() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer April").await?;
        let ani = create_test_recipient(&db, "Ani").await?;
        let budi = create_test_recipient(&db, "Budi").await?;
        let cash = create_test_item(&db, batch.id, ani.id, 4).await?;
        let transfer = create_test_item(&db, batch.id, budi.id, 2).await?;

        let pay_cash = BatchItemPatch {
            payment_method: Some(PaymentMethod::Cash),
            transfer_status: Some(TransferStatus::Done),
            transfer_fee: Some(5_000),
            ..Default::default()
        };
        let updated = update_batch_item(&db, cash.id, pay_cash).await?.unwrap();
        assert_eq!(updated.transfer_fee, 0);

        // Only a cash item is done, so nothing is booked
        assert!(ledger_row(&db, &amount_reference(batch.id)).await?.is_none());

        update_batch_item(&db, transfer.id, mark_done(2_000)).await?;
        let outcome = sync_batch(&db, batch.id).await?.unwrap();
        assert_eq!(outcome.totals.done_count, 1);
        assert_eq!(outcome.totals.total_amount, 100_000);
        assert_eq!(outcome.totals.total_fee, 2_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_txn_date_is_latest_transfer_day() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer Mei").await?;
        let ani = create_test_recipient(&db, "Ani").await?;
        let budi = create_test_recipient(&db, "Budi").await?;
        let first = create_test_item(&db, batch.id, ani.id, 1).await?;
        let second = create_test_item(&db, batch.id, budi.id, 1).await?;

        let at = |day: u32| Utc.with_ymd_and_hms(2025, 5, day, 23, 30, 0).single();
        for (item, day) in [(first.id, 3), (second.id, 10)] {
            let patch = BatchItemPatch {
                transfer_status: Some(TransferStatus::Done),
                transfer_at: Some(at(day)),
                ..Default::default()
            };
            update_batch_item(&db, item, patch).await?;
        }

        let row = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(row.txn_date, NaiveDate::from_ymd_opt(2025, 5, 10).unwrap());
        Ok(())
    }

    #[tokio::test]
    async fn test_manual_edits_are_healed() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer Juni").await?;
        let recipient = create_test_recipient(&db, "Ani").await?;
        let item = create_test_item(&db, batch.id, recipient.id, 2).await?;
        update_batch_item(&db, item.id, mark_done(0)).await?;

        let row = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        let mut tampered: finance_transaction::ActiveModel = row.clone().into();
        tampered.amount = Set(1);
        tampered.status = Set(TxnStatus::Void);
        tampered.update(&db).await?;

        let outcome = sync_batch(&db, batch.id).await?.unwrap();
        assert_eq!(outcome.amount_row, RowAction::Updated(row.id));
        let healed = ledger_row(&db, &amount_reference(batch.id)).await?.unwrap();
        assert_eq!(healed.amount, row.amount);
        assert_eq!(healed.status, TxnStatus::Posted);
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_item_rows_are_voided() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db, "Transfer Juli").await?;
        let recipient = create_test_recipient(&db, "Ani").await?;
        let item = create_test_item(&db, batch.id, recipient.id, 2).await?;
        let category_id = ensure_category(&db, TxnType::Expense, AMOUNT_CATEGORY).await?;

        let now = Utc::now();
        finance_transaction::ActiveModel {
            txn_type: Set(TxnType::Expense),
            sub_type: Set(TxnSubType::Expense),
            category_id: Set(category_id),
            amount: Set(50_000),
            txn_date: Set(now.date_naive()),
            reference_no: Set(Some(legacy_item_reference(item.id))),
            status: Set(TxnStatus::Posted),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let outcome = sync_batch(&db, batch.id).await?.unwrap();
        assert_eq!(outcome.legacy_voided, 1);
        let legacy = ledger_row(&db, &legacy_item_reference(item.id)).await?.unwrap();
        assert_eq!(legacy.status, TxnStatus::Void);

        let again = sync_batch(&db, batch.id).await?.unwrap();
        assert_eq!(again.legacy_voided, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_all_batches() -> Result<()> {
        let db = setup_test_db().await?;
        let recipient = create_test_recipient(&db, "Ani").await?;
        let first = create_test_batch(&db, "Transfer Agustus").await?;
        let second = create_test_batch(&db, "Transfer September").await?;
        let item = create_test_item(&db, first.id, recipient.id, 1).await?;
        create_test_item(&db, second.id, recipient.id, 1).await?;
        update_batch_item(&db, item.id, mark_done(0)).await?;

        // Drop the ledger rows behind the engine's back
        FinanceTransaction::delete_many().exec(&db).await?;

        let outcomes = sync_all_batches(&db).await?;
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].amount_row, RowAction::Created(_)));
        assert_eq!(outcomes[1].amount_row, RowAction::Absent);
        assert!(ledger_row(&db, &amount_reference(first.id)).await?.is_some());
        Ok(())
    }
}
