//! Batch item business logic - one recipient's payment within a batch.
//!
//! Every mutation that can change a batch's transfer totals runs the ledger
//! sync for the owning batch inside the same database transaction.

use crate::{
    core::{
        amount::{
            amount_for_batch, calculate_amount, default_zoom_type, validate_attendance,
            validate_non_negative,
        },
        ledger::sync_batch_ledger,
        recipient::{Payee, effective_payee, get_recipients_by_ids},
    },
    entities::{
        Batch, BatchItem, BatchKind, NotifyStatus, PaymentMethod, Recipient, TransferStatus,
        ZoomType, batch, batch_item, recipient,
    },
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, instrument};

/// Input for [`create_batch_item`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatchItem {
    /// Recipient being paid
    pub recipient_id: i64,
    /// Overrides the computed amount
    pub amount: Option<i64>,
    /// Transfer or cash
    pub payment_method: PaymentMethod,
    /// Saturdays attended
    pub saturdays_attended: i32,
    /// Zoom allowance kind
    pub zoom_type: ZoomType,
    /// Bank fee for the transfer
    pub transfer_fee: i64,
    /// Free-text notes
    pub notes: Option<String>,
}

impl NewBatchItem {
    /// A transfer item with no attendance, zoom allowance or fee.
    #[must_use]
    pub const fn new(recipient_id: i64) -> Self {
        Self {
            recipient_id,
            amount: None,
            payment_method: PaymentMethod::Transfer,
            saturdays_attended: 0,
            zoom_type: ZoomType::None,
            transfer_fee: 0,
            notes: None,
        }
    }
}

/// Partial update for [`update_batch_item`]. `None` leaves a field untouched;
/// `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchItemPatch {
    /// Amount in rupiah
    pub amount: Option<i64>,
    /// Transfer or cash
    pub payment_method: Option<PaymentMethod>,
    /// Saturdays attended
    pub saturdays_attended: Option<i32>,
    /// Zoom allowance kind
    pub zoom_type: Option<ZoomType>,
    /// Bank fee for the transfer
    pub transfer_fee: Option<i64>,
    /// Whether the money was sent
    pub transfer_status: Option<TransferStatus>,
    /// Whether the recipient was told
    pub notify_status: Option<NotifyStatus>,
    /// When the money was sent
    pub transfer_at: Option<Option<DateTime<Utc>>>,
    /// When the recipient was told
    pub notified_at: Option<Option<DateTime<Utc>>>,
    /// Free-text notes
    pub notes: Option<Option<String>>,
    /// Proof filename
    pub transfer_proof: Option<Option<String>>,
}

/// A batch item joined with its recipient and resolved payee.
///
/// The proof filename itself is not exposed, only whether one is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemView {
    /// Row id
    pub id: i64,
    /// Owning batch
    pub batch_id: i64,
    /// Recipient being paid
    pub recipient_id: i64,
    /// Amount in rupiah
    pub amount: i64,
    /// Transfer or cash
    pub payment_method: PaymentMethod,
    /// Saturdays attended
    pub saturdays_attended: i32,
    /// Zoom allowance kind
    pub zoom_type: ZoomType,
    /// Bank fee for the transfer
    pub transfer_fee: i64,
    /// Whether the money was sent
    pub transfer_status: TransferStatus,
    /// Whether the recipient was told
    pub notify_status: NotifyStatus,
    /// When the money was sent
    pub transfer_at: Option<DateTime<Utc>>,
    /// When the recipient was told
    pub notified_at: Option<DateTime<Utc>>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Whether a proof is attached
    pub has_transfer_proof: bool,
    /// Recipient display name
    pub recipient_name: String,
    /// Bank or e-wallet provider
    pub bank_name: Option<String>,
    /// Account number
    pub account_number: Option<String>,
    /// Contact handle
    pub whatsapp: Option<String>,
    /// Recipient note
    pub note: Option<String>,
    /// Recipient whose account receives the money
    pub transfer_to_id: Option<i64>,
    /// Family group
    pub family_group_id: Option<i64>,
    /// Name of the `transfer_to` recipient
    pub transfer_to_name: Option<String>,
    /// Account the money actually goes to
    pub payee: Payee,
}

impl BatchItemView {
    fn new(item: batch_item::Model, recipient: &recipient::Model, transfer_to: Option<&recipient::Model>) -> Self {
        Self {
            id: item.id,
            batch_id: item.batch_id,
            recipient_id: item.recipient_id,
            amount: item.amount,
            payment_method: item.payment_method,
            saturdays_attended: item.saturdays_attended,
            zoom_type: item.zoom_type,
            transfer_fee: item.transfer_fee,
            transfer_status: item.transfer_status,
            notify_status: item.notify_status,
            transfer_at: item.transfer_at,
            notified_at: item.notified_at,
            notes: item.notes,
            has_transfer_proof: item.transfer_proof.is_some_and(|p| !p.is_empty()),
            recipient_name: recipient.name.clone(),
            bank_name: recipient.bank_name.clone(),
            account_number: recipient.account_number.clone(),
            whatsapp: recipient.whatsapp.clone(),
            note: recipient.note.clone(),
            transfer_to_id: recipient.transfer_to_id,
            family_group_id: recipient.family_group_id,
            transfer_to_name: transfer_to.map(|t| t.name.clone()),
            payee: effective_payee(recipient, transfer_to),
        }
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Finds a batch item by id.
pub async fn get_batch_item_by_id(
    db: &DatabaseConnection,
    item_id: i64,
) -> Result<Option<batch_item::Model>> {
    BatchItem::find_by_id(item_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Items of a batch with recipient and payee details, ordered by recipient name.
pub async fn get_batch_items(db: &DatabaseConnection, batch_id: i64) -> Result<Vec<BatchItemView>> {
    let items = BatchItem::find()
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .order_by_asc(batch_item::Column::Id)
        .all(db)
        .await?;

    let recipients = get_recipients_by_ids(db, items.iter().map(|item| item.recipient_id)).await?;
    let transfer_targets =
        get_recipients_by_ids(db, recipients.values().filter_map(|r| r.transfer_to_id)).await?;

    let mut views: Vec<BatchItemView> = items
        .into_iter()
        .filter_map(|item| {
            let recipient = recipients.get(&item.recipient_id)?;
            let transfer_to = recipient
                .transfer_to_id
                .and_then(|id| transfer_targets.get(&id));
            Some(BatchItemView::new(item, recipient, transfer_to))
        })
        .collect();

    views.sort_by(|a, b| a.recipient_name.cmp(&b.recipient_name).then(a.id.cmp(&b.id)));
    Ok(views)
}

/// Adds a recipient to a batch.
///
/// Monthly items get their amount from attendance and zoom type unless an
/// explicit amount is given; special items get the batch's default amount and
/// ignore attendance and zoom. Returns `None` when the batch or recipient does
/// not exist or the recipient is already in the batch.
#[instrument(skip(db, new), fields(recipient_id = new.recipient_id))]
pub async fn create_batch_item(
    db: &DatabaseConnection,
    batch_id: i64,
    new: NewBatchItem,
) -> Result<Option<batch_item::Model>> {
    let txn = db.begin().await?;

    let Some(batch) = Batch::find_by_id(batch_id).one(&txn).await? else {
        return Ok(None);
    };
    if Recipient::find_by_id(new.recipient_id).one(&txn).await?.is_none() {
        return Ok(None);
    }

    let duplicate = BatchItem::find()
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .filter(batch_item::Column::RecipientId.eq(new.recipient_id))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        debug!("Recipient {} already in batch {batch_id}", new.recipient_id);
        return Ok(None);
    }

    let (saturdays_attended, zoom_type) = match batch.kind {
        BatchKind::Monthly => {
            validate_attendance(&batch, new.saturdays_attended)?;
            (new.saturdays_attended, new.zoom_type)
        }
        BatchKind::Special => (0, ZoomType::None),
    };
    let amount = new
        .amount
        .unwrap_or_else(|| amount_for_batch(&batch, saturdays_attended, zoom_type));
    validate_non_negative(amount)?;

    let (transfer_fee, payment_method) = match new.payment_method {
        PaymentMethod::Cash => (0, PaymentMethod::Cash),
        PaymentMethod::Transfer => (new.transfer_fee, PaymentMethod::Transfer),
    };
    validate_non_negative(transfer_fee)?;

    let now = Utc::now();
    let item = batch_item::ActiveModel {
        batch_id: Set(batch_id),
        recipient_id: Set(new.recipient_id),
        amount: Set(amount),
        payment_method: Set(payment_method),
        saturdays_attended: Set(saturdays_attended),
        zoom_type: Set(zoom_type),
        transfer_fee: Set(transfer_fee),
        transfer_status: Set(TransferStatus::Pending),
        notify_status: Set(NotifyStatus::Pending),
        transfer_at: Set(None),
        notified_at: Set(None),
        notes: Set(clean_text(new.notes)),
        transfer_proof: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    sync_batch_ledger(&txn, batch_id).await?;
    txn.commit().await?;
    Ok(Some(item))
}

/// Computes the item that results from applying `patch` to `existing`.
///
/// Attendance or zoom changes recompute the amount for monthly batches and
/// are ignored for special batches. Status changes without an explicit
/// timestamp stamp `now` (done, sent) or clear it. Cash items never carry a
/// fee or proof.
fn apply_patch(
    batch: &batch::Model,
    existing: &batch_item::Model,
    patch: BatchItemPatch,
    now: DateTime<Utc>,
) -> Result<batch_item::Model> {
    let mut next = existing.clone();

    if let Some(amount) = patch.amount {
        next.amount = amount;
    }
    if let Some(payment_method) = patch.payment_method {
        next.payment_method = payment_method;
    }
    if let Some(transfer_fee) = patch.transfer_fee {
        next.transfer_fee = transfer_fee;
    }
    if let Some(notes) = patch.notes {
        next.notes = clean_text(notes);
    }
    if let Some(transfer_proof) = patch.transfer_proof {
        next.transfer_proof = transfer_proof.filter(|p| !p.is_empty());
    }

    if patch.saturdays_attended.is_some() || patch.zoom_type.is_some() {
        match batch.kind {
            BatchKind::Monthly => {
                let attended = patch
                    .saturdays_attended
                    .unwrap_or(existing.saturdays_attended);
                validate_attendance(batch, attended)?;
                next.saturdays_attended = attended;
                next.zoom_type = patch.zoom_type.unwrap_or(existing.zoom_type);
                next.amount = calculate_amount(
                    attended,
                    batch.transport_rate,
                    next.zoom_type,
                    batch.zoom_single_rate,
                    batch.zoom_family_rate,
                );
            }
            BatchKind::Special => next.amount = existing.amount,
        }
    }

    if let Some(status) = patch.transfer_status {
        next.transfer_status = status;
    }
    match patch.transfer_at {
        Some(transfer_at) => next.transfer_at = transfer_at,
        None if patch.transfer_status.is_some() => {
            next.transfer_at = match next.transfer_status {
                TransferStatus::Done => next.transfer_at.or(Some(now)),
                TransferStatus::Pending => None,
            };
        }
        None => {}
    }

    if let Some(status) = patch.notify_status {
        next.notify_status = status;
    }
    match patch.notified_at {
        Some(notified_at) => next.notified_at = notified_at,
        None if patch.notify_status.is_some() => {
            next.notified_at = match next.notify_status {
                NotifyStatus::Sent => next.notified_at.or(Some(now)),
                NotifyStatus::Pending | NotifyStatus::Skipped => None,
            };
        }
        None => {}
    }

    if next.payment_method == PaymentMethod::Cash {
        next.transfer_fee = 0;
        next.transfer_proof = None;
    }

    validate_non_negative(next.amount)?;
    validate_non_negative(next.transfer_fee)?;

    if next != *existing {
        next.updated_at = now;
    }
    Ok(next)
}

/// Whether the change between two item states can move the ledger totals.
fn affects_ledger(before: &batch_item::Model, after: &batch_item::Model) -> bool {
    before.amount != after.amount
        || before.transfer_fee != after.transfer_fee
        || before.payment_method != after.payment_method
        || before.transfer_status != after.transfer_status
        || before.transfer_at != after.transfer_at
}

/// Applies `patch` to an item and syncs the ledger when totals may have moved.
///
/// Returns the updated item, or `None` if it does not exist.
#[instrument(skip(db, patch))]
pub async fn update_batch_item(
    db: &DatabaseConnection,
    item_id: i64,
    patch: BatchItemPatch,
) -> Result<Option<batch_item::Model>> {
    let txn = db.begin().await?;

    let Some(existing) = BatchItem::find_by_id(item_id).one(&txn).await? else {
        return Ok(None);
    };
    let Some(batch) = Batch::find_by_id(existing.batch_id).one(&txn).await? else {
        return Ok(None);
    };

    let next = apply_patch(&batch, &existing, patch, Utc::now())?;
    if next == existing {
        return Ok(Some(existing));
    }

    let mut item: batch_item::ActiveModel = existing.clone().into();
    item.amount = Set(next.amount);
    item.payment_method = Set(next.payment_method);
    item.saturdays_attended = Set(next.saturdays_attended);
    item.zoom_type = Set(next.zoom_type);
    item.transfer_fee = Set(next.transfer_fee);
    item.transfer_status = Set(next.transfer_status);
    item.notify_status = Set(next.notify_status);
    item.transfer_at = Set(next.transfer_at);
    item.notified_at = Set(next.notified_at);
    item.notes = Set(next.notes);
    item.transfer_proof = Set(next.transfer_proof);
    item.updated_at = Set(next.updated_at);
    let updated = item.update(&txn).await?;

    if affects_ledger(&existing, &updated) {
        sync_batch_ledger(&txn, updated.batch_id).await?;
    }

    txn.commit().await?;
    Ok(Some(updated))
}

/// Deletes an item and re-syncs its batch. Returns `false` if it does not exist.
#[instrument(skip(db))]
pub async fn delete_batch_item(db: &DatabaseConnection, item_id: i64) -> Result<bool> {
    let txn = db.begin().await?;

    let Some(existing) = BatchItem::find_by_id(item_id).one(&txn).await? else {
        return Ok(false);
    };
    BatchItem::delete_by_id(item_id).exec(&txn).await?;
    sync_batch_ledger(&txn, existing.batch_id).await?;

    txn.commit().await?;
    Ok(true)
}

/// Adds every active recipient not yet in the batch.
///
/// Monthly items start with zero attendance and the recipient's zoom type;
/// special items get the default amount. Returns the number of items added,
/// or `None` if the batch does not exist.
#[instrument(skip(db))]
pub async fn populate_batch(db: &DatabaseConnection, batch_id: i64) -> Result<Option<u64>> {
    let txn = db.begin().await?;

    let Some(batch) = Batch::find_by_id(batch_id).one(&txn).await? else {
        return Ok(None);
    };

    let recipients = Recipient::find()
        .filter(recipient::Column::IsActive.eq(true))
        .order_by_asc(recipient::Column::Name)
        .all(&txn)
        .await?;
    let existing: HashSet<i64> = BatchItem::find()
        .select_only()
        .column(batch_item::Column::RecipientId)
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .into_tuple::<i64>()
        .all(&txn)
        .await?
        .into_iter()
        .collect();

    let now = Utc::now();
    let mut added = 0;
    for recipient in recipients.iter().filter(|r| !existing.contains(&r.id)) {
        let zoom_type = match batch.kind {
            BatchKind::Monthly => default_zoom_type(recipient),
            BatchKind::Special => ZoomType::None,
        };
        batch_item::ActiveModel {
            batch_id: Set(batch_id),
            recipient_id: Set(recipient.id),
            amount: Set(amount_for_batch(&batch, 0, zoom_type)),
            payment_method: Set(PaymentMethod::Transfer),
            saturdays_attended: Set(0),
            zoom_type: Set(zoom_type),
            transfer_fee: Set(0),
            transfer_status: Set(TransferStatus::Pending),
            notify_status: Set(NotifyStatus::Pending),
            transfer_at: Set(None),
            notified_at: Set(None),
            notes: Set(None),
            transfer_proof: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        added += 1;
    }

    txn.commit().await?;
    info!("Populated batch {batch_id} with {added} recipients");
    Ok(Some(added))
}

/// Distinct batch ids owning any of `item_ids`, ascending.
async fn owning_batches<C: ConnectionTrait>(conn: &C, item_ids: &[i64]) -> Result<BTreeSet<i64>> {
    let batch_ids: Vec<i64> = BatchItem::find()
        .select_only()
        .column(batch_item::Column::BatchId)
        .distinct()
        .filter(batch_item::Column::Id.is_in(item_ids.iter().copied()))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(batch_ids.into_iter().collect())
}

/// Sets the transfer status of many items at once.
///
/// `done` stamps `transfer_at = now`, `pending` clears it. All rows are written
/// before the ledger of each affected batch is synced once. Returns the number
/// of rows changed.
#[instrument(skip(db, item_ids), fields(count = item_ids.len()))]
pub async fn bulk_update_transfer(
    db: &DatabaseConnection,
    item_ids: &[i64],
    status: TransferStatus,
) -> Result<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }

    let txn = db.begin().await?;
    let now = Utc::now();
    let result = BatchItem::update_many()
        .set(batch_item::ActiveModel {
            transfer_status: Set(status),
            transfer_at: Set((status == TransferStatus::Done).then_some(now)),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(batch_item::Column::Id.is_in(item_ids.iter().copied()))
        .exec(&txn)
        .await?;

    for batch_id in owning_batches(&txn, item_ids).await? {
        sync_batch_ledger(&txn, batch_id).await?;
    }

    txn.commit().await?;
    Ok(result.rows_affected)
}

/// Sets the notification status of many items at once.
///
/// `sent` stamps `notified_at = now`, other states clear it. Returns the number
/// of rows changed.
#[instrument(skip(db, item_ids), fields(count = item_ids.len()))]
pub async fn bulk_update_notify(
    db: &DatabaseConnection,
    item_ids: &[i64],
    status: NotifyStatus,
) -> Result<u64> {
    if item_ids.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let result = BatchItem::update_many()
        .set(batch_item::ActiveModel {
            notify_status: Set(status),
            notified_at: Set((status == NotifyStatus::Sent).then_some(now)),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(batch_item::Column::Id.is_in(item_ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Sets the attendance of every item in a monthly batch and recomputes amounts.
///
/// Special batches are left unchanged. Returns the number of items updated, or
/// `None` if the batch does not exist.
#[instrument(skip(db))]
pub async fn bulk_update_attendance(
    db: &DatabaseConnection,
    batch_id: i64,
    attended: i32,
) -> Result<Option<u64>> {
    let txn = db.begin().await?;

    let Some(batch) = Batch::find_by_id(batch_id).one(&txn).await? else {
        return Ok(None);
    };
    validate_attendance(&batch, attended)?;
    if batch.kind == BatchKind::Special {
        debug!("Batch {batch_id} is special, attendance ignored");
        return Ok(Some(0));
    }

    let items = BatchItem::find()
        .filter(batch_item::Column::BatchId.eq(batch_id))
        .all(&txn)
        .await?;

    let now = Utc::now();
    let mut updated = 0;
    for item in items {
        let amount = calculate_amount(
            attended,
            batch.transport_rate,
            item.zoom_type,
            batch.zoom_single_rate,
            batch.zoom_family_rate,
        );
        let mut item: batch_item::ActiveModel = item.into();
        item.saturdays_attended = Set(attended);
        item.amount = Set(amount);
        item.updated_at = Set(now);
        item.update(&txn).await?;
        updated += 1;
    }

    sync_batch_ledger(&txn, batch_id).await?;
    txn.commit().await?;
    Ok(Some(updated))
}
