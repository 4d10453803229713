//! Recipient business logic - the people batches pay out to.
//!
//! A recipient may route its money through another recipient's account
//! (`transfer_to`) and may share a zoom allowance with other recipients through
//! a family group id. Payee bank details are resolved at read time through at
//! most one `transfer_to` hop; chains are rejected when the link is written.

use crate::{
    config::RecipientSeed,
    entities::{Recipient, SystemState, recipient, system_state},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    ActiveValue::NotSet, Condition, ConnectionTrait, PaginatorTrait, QueryOrder, QuerySelect, Set,
    TransactionTrait, prelude::*,
};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument, warn};

/// `system_state` key holding the highest family group id ever handed out
pub const FAMILY_GROUP_SEQ_KEY: &str = "family_group_seq";

/// Input for [`create_recipient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipient {
    /// Display name, must not be blank
    pub name: String,
    /// Bank or e-wallet provider
    pub bank_name: Option<String>,
    /// Account number
    pub account_number: Option<String>,
    /// Contact handle
    pub whatsapp: Option<String>,
    /// Free-text note
    pub note: Option<String>,
    /// Recipient whose account receives this recipient's money
    pub transfer_to_id: Option<i64>,
    /// Family group shared with other recipients
    pub family_group_id: Option<i64>,
    /// Whether monthly batches pay a zoom allowance
    pub zoom_eligible: bool,
}

impl NewRecipient {
    /// A zoom-eligible recipient with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bank_name: None,
            account_number: None,
            whatsapp: None,
            note: None,
            transfer_to_id: None,
            family_group_id: None,
            zoom_eligible: true,
        }
    }
}

/// Partial update for [`update_recipient`]. `None` leaves a field untouched;
/// `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientPatch {
    /// New name, must not be blank
    pub name: Option<String>,
    /// Bank or e-wallet provider
    pub bank_name: Option<Option<String>>,
    /// Account number
    pub account_number: Option<Option<String>>,
    /// Contact handle
    pub whatsapp: Option<Option<String>>,
    /// Recipient note
    pub note: Option<Option<String>>,
    /// Recipient whose account receives the money
    pub transfer_to_id: Option<Option<i64>>,
    /// Family group
    pub family_group_id: Option<Option<i64>>,
    /// Whether monthly batches pay a zoom allowance
    pub zoom_eligible: Option<bool>,
    /// Restores or hides the recipient
    pub is_active: Option<bool>,
}

/// A recipient together with its `transfer_to` name and family members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientDetails {
    /// The recipient row
    pub recipient: recipient::Model,
    /// Name of the `transfer_to` recipient
    pub transfer_to_name: Option<String>,
    /// Names of the other active members of the recipient's family group
    pub family_members: Vec<String>,
}

/// Bank details the money for a recipient actually goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payee {
    /// Account holder
    pub holder_name: String,
    /// Bank or e-wallet provider
    pub bank_name: Option<String>,
    /// Account number
    pub account_number: Option<String>,
}

/// Resolves the payee for `recipient`, one hop through `transfer_to`.
///
/// Each field prefers the `transfer_to` recipient's value and falls back to the
/// recipient's own when that value is missing.
#[must_use]
pub fn effective_payee(recipient: &recipient::Model, transfer_to: Option<&recipient::Model>) -> Payee {
    Payee {
        holder_name: transfer_to.map_or_else(|| recipient.name.clone(), |t| t.name.clone()),
        bank_name: transfer_to
            .and_then(|t| t.bank_name.clone())
            .or_else(|| recipient.bank_name.clone()),
        account_number: transfer_to
            .and_then(|t| t.account_number.clone())
            .or_else(|| recipient.account_number.clone()),
    }
}

/// Loads a recipient and resolves its payee. `None` if the recipient does not exist.
pub async fn resolve_payee<C: ConnectionTrait>(conn: &C, recipient_id: i64) -> Result<Option<Payee>> {
    let Some(recipient) = Recipient::find_by_id(recipient_id).one(conn).await? else {
        return Ok(None);
    };
    let transfer_to = match recipient.transfer_to_id {
        Some(id) => Recipient::find_by_id(id).one(conn).await?,
        None => None,
    };
    Ok(Some(effective_payee(&recipient, transfer_to.as_ref())))
}

/// All active recipients ordered by name.
pub async fn get_all_active_recipients(db: &DatabaseConnection) -> Result<Vec<recipient::Model>> {
    Recipient::find()
        .filter(recipient::Column::IsActive.eq(true))
        .order_by_asc(recipient::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads recipients by id, keyed by id.
pub async fn get_recipients_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = i64>,
) -> Result<HashMap<i64, recipient::Model>> {
    let ids: Vec<i64> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = Recipient::find()
        .filter(recipient::Column::Id.is_in(ids))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| (r.id, r)).collect())
}

/// Finds a recipient by id, active or not.
pub async fn get_recipient_by_id(
    db: &DatabaseConnection,
    recipient_id: i64,
) -> Result<Option<recipient::Model>> {
    Recipient::find_by_id(recipient_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a recipient with its `transfer_to` name and family members.
pub async fn get_recipient_details(
    db: &DatabaseConnection,
    recipient_id: i64,
) -> Result<Option<RecipientDetails>> {
    let Some(recipient) = get_recipient_by_id(db, recipient_id).await? else {
        return Ok(None);
    };

    let transfer_to_name = match recipient.transfer_to_id {
        Some(id) => get_recipient_by_id(db, id).await?.map(|r| r.name),
        None => None,
    };

    let family_members = match recipient.family_group_id {
        Some(group_id) => get_family_members(db, group_id)
            .await?
            .into_iter()
            .filter(|member| member.id != recipient.id)
            .map(|member| member.name)
            .collect(),
        None => Vec::new(),
    };

    Ok(Some(RecipientDetails {
        recipient,
        transfer_to_name,
        family_members,
    }))
}

/// Active recipients whose name, bank, account number or note contains `query`.
pub async fn search_recipients(db: &DatabaseConnection, query: &str) -> Result<Vec<recipient::Model>> {
    let query = query.trim();
    Recipient::find()
        .filter(recipient::Column::IsActive.eq(true))
        .filter(
            Condition::any()
                .add(recipient::Column::Name.contains(query))
                .add(recipient::Column::BankName.contains(query))
                .add(recipient::Column::AccountNumber.contains(query))
                .add(recipient::Column::Note.contains(query)),
        )
        .order_by_asc(recipient::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an active recipient by exact name.
pub async fn find_active_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<recipient::Model>> {
    Recipient::find()
        .filter(recipient::Column::Name.eq(name))
        .filter(recipient::Column::IsActive.eq(true))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Checks that `recipient_id` (when already stored) may route its money to `target_id`.
///
/// The target must exist, must not be the recipient itself and must not route
/// onwards; a recipient that others route to may not route anywhere itself.
async fn validate_transfer_to<C: ConnectionTrait>(
    conn: &C,
    recipient_id: Option<i64>,
    target_id: i64,
) -> Result<()> {
    if recipient_id == Some(target_id) {
        return Err(Error::Validation {
            message: "A recipient cannot transfer to itself".to_string(),
        });
    }

    let Some(target) = Recipient::find_by_id(target_id).one(conn).await? else {
        return Err(Error::Validation {
            message: format!("Transfer-to recipient {target_id} not found"),
        });
    };

    if target.transfer_to_id.is_some() {
        return Err(Error::Validation {
            message: format!("'{}' already transfers to another recipient", target.name),
        });
    }

    if let Some(id) = recipient_id {
        let routed_here = Recipient::find()
            .filter(recipient::Column::TransferToId.eq(id))
            .count(conn)
            .await?;
        if routed_here > 0 {
            return Err(Error::Validation {
                message: "Other recipients transfer to this recipient".to_string(),
            });
        }
    }

    Ok(())
}

/// Creates a recipient. The row and the family group high-water mark are
/// written in one transaction.
#[instrument(skip(db, new), fields(name = %new.name))]
pub async fn create_recipient(db: &DatabaseConnection, new: NewRecipient) -> Result<recipient::Model> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::Validation {
            message: "Recipient name cannot be empty".to_string(),
        });
    }

    if let Some(target_id) = new.transfer_to_id {
        validate_transfer_to(db, None, target_id).await?;
    }

    let now = Utc::now();
    let recipient = recipient::ActiveModel {
        name: Set(name.to_string()),
        bank_name: Set(non_blank(new.bank_name)),
        account_number: Set(non_blank(new.account_number)),
        whatsapp: Set(non_blank(new.whatsapp)),
        note: Set(non_blank(new.note)),
        transfer_to_id: Set(new.transfer_to_id),
        family_group_id: Set(new.family_group_id),
        zoom_eligible: Set(new.zoom_eligible),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let txn = db.begin().await?;
    let created = recipient.insert(&txn).await?;
    if let Some(group_id) = created.family_group_id {
        bump_family_group_seq(&txn, group_id).await?;
    }
    txn.commit().await?;
    info!("Created recipient {}", created.id);
    Ok(created)
}

/// Applies `patch` to a recipient. Returns `false` if the recipient does not exist.
#[instrument(skip(db, patch))]
pub async fn update_recipient(
    db: &DatabaseConnection,
    recipient_id: i64,
    patch: RecipientPatch,
) -> Result<bool> {
    let Some(existing) = get_recipient_by_id(db, recipient_id).await? else {
        return Ok(false);
    };

    if let Some(Some(target_id)) = patch.transfer_to_id {
        if existing.transfer_to_id != Some(target_id) {
            validate_transfer_to(db, Some(recipient_id), target_id).await?;
        }
    }

    let mut recipient: recipient::ActiveModel = existing.into();
    if let Some(name) = patch.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation {
                message: "Recipient name cannot be empty".to_string(),
            });
        }
        recipient.name = Set(name);
    }
    if let Some(bank_name) = patch.bank_name {
        recipient.bank_name = Set(non_blank(bank_name));
    }
    if let Some(account_number) = patch.account_number {
        recipient.account_number = Set(non_blank(account_number));
    }
    if let Some(whatsapp) = patch.whatsapp {
        recipient.whatsapp = Set(non_blank(whatsapp));
    }
    if let Some(note) = patch.note {
        recipient.note = Set(non_blank(note));
    }
    if let Some(transfer_to_id) = patch.transfer_to_id {
        recipient.transfer_to_id = Set(transfer_to_id);
    }
    if let Some(family_group_id) = patch.family_group_id {
        recipient.family_group_id = Set(family_group_id);
    }
    if let Some(zoom_eligible) = patch.zoom_eligible {
        recipient.zoom_eligible = Set(zoom_eligible);
    }
    if let Some(is_active) = patch.is_active {
        recipient.is_active = Set(is_active);
    }
    recipient.updated_at = Set(Utc::now());

    let txn = db.begin().await?;
    let updated = recipient.update(&txn).await?;
    if let Some(group_id) = updated.family_group_id {
        bump_family_group_seq(&txn, group_id).await?;
    }
    txn.commit().await?;
    Ok(true)
}

/// Marks a recipient inactive. Returns `false` if the recipient does not exist.
#[instrument(skip(db))]
pub async fn soft_delete_recipient(db: &DatabaseConnection, recipient_id: i64) -> Result<bool> {
    let result = Recipient::update_many()
        .set(recipient::ActiveModel {
            is_active: Set(false),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(recipient::Column::Id.eq(recipient_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Active members of a family group ordered by name.
pub async fn get_family_members(
    db: &DatabaseConnection,
    family_group_id: i64,
) -> Result<Vec<recipient::Model>> {
    Recipient::find()
        .filter(recipient::Column::FamilyGroupId.eq(family_group_id))
        .filter(recipient::Column::IsActive.eq(true))
        .order_by_asc(recipient::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The id the next new family group will get.
///
/// One more than the highest id ever assigned, so ids of emptied groups are
/// never handed out again.
pub async fn next_family_group_id<C: ConnectionTrait>(conn: &C) -> Result<i64> {
    let max_assigned: Option<i64> = Recipient::find()
        .select_only()
        .column_as(recipient::Column::FamilyGroupId.max(), "max_id")
        .into_tuple::<Option<i64>>()
        .one(conn)
        .await?
        .flatten();

    let high_water = family_group_seq(conn).await?;
    Ok(max_assigned.unwrap_or(0).max(high_water) + 1)
}

async fn family_group_seq<C: ConnectionTrait>(conn: &C) -> Result<i64> {
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(FAMILY_GROUP_SEQ_KEY))
        .one(conn)
        .await?;
    Ok(state.and_then(|s| s.value.parse().ok()).unwrap_or(0))
}

/// Raises the stored high-water mark to `group_id` if it is lower.
async fn bump_family_group_seq<C: ConnectionTrait>(conn: &C, group_id: i64) -> Result<()> {
    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(FAMILY_GROUP_SEQ_KEY))
        .one(conn)
        .await?;

    match existing {
        Some(state) => {
            if state.value.parse::<i64>().unwrap_or(0) >= group_id {
                return Ok(());
            }
            let mut state: system_state::ActiveModel = state.into();
            state.value = Set(group_id.to_string());
            state.updated_at = Set(Utc::now());
            state.update(conn).await?;
        }
        None => {
            system_state::ActiveModel {
                id: NotSet,
                key: Set(FAMILY_GROUP_SEQ_KEY.to_string()),
                value: Set(group_id.to_string()),
                updated_at: Set(Utc::now()),
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

async fn assign_family_group<C: ConnectionTrait>(
    conn: &C,
    recipient_ids: &[i64],
    family_group_id: Option<i64>,
) -> Result<u64> {
    if recipient_ids.is_empty() {
        return Ok(0);
    }
    let result = Recipient::update_many()
        .set(recipient::ActiveModel {
            family_group_id: Set(family_group_id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(recipient::Column::Id.is_in(recipient_ids.iter().copied()))
        .exec(conn)
        .await?;

    if let Some(group_id) = family_group_id {
        bump_family_group_seq(conn, group_id).await?;
    }
    Ok(result.rows_affected)
}

/// Puts every recipient in `recipient_ids` into `family_group_id`, or clears
/// their group when `None`. All-or-nothing; returns the number of rows changed.
#[instrument(skip(db))]
pub async fn set_family_group(
    db: &DatabaseConnection,
    recipient_ids: &[i64],
    family_group_id: Option<i64>,
) -> Result<u64> {
    let txn = db.begin().await?;
    let changed = assign_family_group(&txn, recipient_ids, family_group_id).await?;
    txn.commit().await?;
    Ok(changed)
}

/// Allocates a fresh family group and assigns `recipient_ids` to it.
///
/// Returns the new group id and the number of rows changed.
#[instrument(skip(db))]
pub async fn create_family_group(db: &DatabaseConnection, recipient_ids: &[i64]) -> Result<(i64, u64)> {
    if recipient_ids.is_empty() {
        return Err(Error::Validation {
            message: "A family group needs at least one member".to_string(),
        });
    }

    let txn = db.begin().await?;
    let group_id = next_family_group_id(&txn).await?;
    let changed = assign_family_group(&txn, recipient_ids, Some(group_id)).await?;
    txn.commit().await?;

    info!("Created family group {group_id} with {changed} members");
    Ok((group_id, changed))
}

/// Inserts the configured recipients when the recipient table is empty.
///
/// Runs in three passes inside one transaction: insert every seed, link
/// `transfer_to` by exact name, then give each (recipient, `transfer_to`) pair
/// that is not grouped yet its own family group. Returns the number inserted.
pub async fn seed_recipients(db: &DatabaseConnection, seeds: &[RecipientSeed]) -> Result<usize> {
    if seeds.is_empty() || Recipient::find().count(db).await? > 0 {
        return Ok(0);
    }

    let txn = db.begin().await?;
    let now = Utc::now();

    for seed in seeds {
        recipient::ActiveModel {
            name: Set(seed.name.trim().to_string()),
            bank_name: Set(non_blank(seed.bank_name.clone())),
            account_number: Set(non_blank(seed.account_number.clone())),
            whatsapp: Set(non_blank(seed.whatsapp.clone())),
            note: Set(non_blank(seed.note.clone())),
            transfer_to_id: Set(None),
            family_group_id: Set(None),
            zoom_eligible: Set(true),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    for seed in seeds {
        let Some(target_name) = seed.transfer_to.as_deref() else {
            continue;
        };
        let source = find_active_by_name(&txn, seed.name.trim()).await?;
        let target = find_active_by_name(&txn, target_name.trim()).await?;
        let (Some(source), Some(target)) = (source, target) else {
            warn!("Seed '{}' transfers to unknown recipient '{target_name}'", seed.name);
            continue;
        };
        if let Err(e) = validate_transfer_to(&txn, Some(source.id), target.id).await {
            warn!("Skipping transfer link for seed '{}': {e}", seed.name);
            continue;
        }
        let mut source: recipient::ActiveModel = source.into();
        source.transfer_to_id = Set(Some(target.id));
        source.update(&txn).await?;
    }

    let all = Recipient::find()
        .order_by_asc(recipient::Column::Name)
        .all(&txn)
        .await?;
    let mut grouped: HashSet<i64> = HashSet::new();
    for recipient in &all {
        let Some(target_id) = recipient.transfer_to_id else {
            continue;
        };
        if grouped.contains(&recipient.id) || grouped.contains(&target_id) {
            continue;
        }
        let group_id = next_family_group_id(&txn).await?;
        assign_family_group(&txn, &[recipient.id, target_id], Some(group_id)).await?;
        grouped.insert(recipient.id);
        grouped.insert(target_id);
    }

    txn.commit().await?;
    info!("Seeded {} recipients", seeds.len());
    Ok(seeds.len())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{create_custom_recipient, create_test_recipient, setup_test_db};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_recipient_trims_and_defaults() -> Result<()> {
        let db = setup_test_db().await?;
        let mut new = NewRecipient::new("  Budi  ");
        new.bank_name = Some("BCA".to_string());
        new.account_number = Some("   ".to_string());

        let recipient = create_recipient(&db, new).await?;
        assert_eq!(recipient.name, "Budi");
        assert_eq!(recipient.bank_name.as_deref(), Some("BCA"));
        assert_eq!(recipient.account_number, None);
        assert!(recipient.zoom_eligible);
        assert!(recipient.is_active);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_recipient_rejects_empty_name() {
        // Validation fails before any query reaches the connection
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = create_recipient(&db, NewRecipient::new("   ")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_transfer_to_self_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let recipient = create_test_recipient(&db, "Ani").await?;

        let patch = RecipientPatch {
            transfer_to_id: Some(Some(recipient.id)),
            ..Default::default()
        };
        let result = update_recipient(&db, recipient.id, patch).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_to_chain_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_recipient(&db, "A").await?;
        let b = create_test_recipient(&db, "B").await?;
        let c = create_test_recipient(&db, "C").await?;

        // B -> C is fine
        let patch = RecipientPatch {
            transfer_to_id: Some(Some(c.id)),
            ..Default::default()
        };
        assert!(update_recipient(&db, b.id, patch).await?);

        // A -> B would make A -> B -> C
        let mut new = NewRecipient::new("D");
        new.transfer_to_id = Some(b.id);
        assert!(create_recipient(&db, new).await.is_err());

        let patch = RecipientPatch {
            transfer_to_id: Some(Some(b.id)),
            ..Default::default()
        };
        assert!(update_recipient(&db, a.id, patch).await.is_err());

        // C is a target, so C -> A would make B -> C -> A
        let patch = RecipientPatch {
            transfer_to_id: Some(Some(a.id)),
            ..Default::default()
        };
        assert!(update_recipient(&db, c.id, patch).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_recipient_returns_false() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(!update_recipient(&db, 999, RecipientPatch::default()).await?);
        assert!(!soft_delete_recipient(&db, 999).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_update_and_clear() -> Result<()> {
        let db = setup_test_db().await?;
        let recipient =
            create_custom_recipient(&db, "Citra", Some("BRI"), Some("111"), None).await?;

        let patch = RecipientPatch {
            bank_name: Some(None),
            note: Some(Some("pindah rekening".to_string())),
            ..Default::default()
        };
        assert!(update_recipient(&db, recipient.id, patch).await?);

        let updated = get_recipient_by_id(&db, recipient.id).await?.unwrap();
        assert_eq!(updated.bank_name, None);
        assert_eq!(updated.account_number.as_deref(), Some("111"));
        assert_eq!(updated.note.as_deref(), Some("pindah rekening"));
        assert_eq!(updated.name, "Citra");
        Ok(())
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active_queries() -> Result<()> {
        let db = setup_test_db().await?;
        let ani = create_test_recipient(&db, "Ani").await?;
        create_test_recipient(&db, "Budi").await?;

        assert!(soft_delete_recipient(&db, ani.id).await?);

        let active = get_all_active_recipients(&db).await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Budi");
        assert!(find_active_by_name(&db, "Ani").await?.is_none());
        // Still loadable by id
        assert!(get_recipient_by_id(&db, ani.id).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_search_recipients() -> Result<()> {
        let db = setup_test_db().await?;
        create_custom_recipient(&db, "Ani", Some("BCA"), Some("123456"), None).await?;
        create_custom_recipient(&db, "Budi", Some("Mandiri"), Some("987"), Some("lansia"))
            .await?;
        create_custom_recipient(&db, "Cahya", Some("DANA"), Some("0812"), None).await?;

        let by_bank = search_recipients(&db, "mandiri").await?;
        assert_eq!(by_bank.len(), 1);
        assert_eq!(by_bank[0].name, "Budi");

        let by_account = search_recipients(&db, "3456").await?;
        assert_eq!(by_account.len(), 1);
        assert_eq!(by_account[0].name, "Ani");

        let by_note = search_recipients(&db, "lansia").await?;
        assert_eq!(by_note[0].name, "Budi");

        assert_eq!(search_recipients(&db, "").await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_payee_resolution_prefers_transfer_to() -> Result<()> {
        let db = setup_test_db().await?;
        let b = create_custom_recipient(&db, "Bapak B", Some("BNI"), Some("555"), None).await?;
        let mut new = NewRecipient::new("Anak A");
        new.bank_name = Some("BCA".to_string());
        new.account_number = Some("111".to_string());
        new.transfer_to_id = Some(b.id);
        let a = create_recipient(&db, new).await?;

        let payee = resolve_payee(&db, a.id).await?.unwrap();
        assert_eq!(payee.holder_name, "Bapak B");
        assert_eq!(payee.bank_name.as_deref(), Some("BNI"));
        assert_eq!(payee.account_number.as_deref(), Some("555"));

        let own = resolve_payee(&db, b.id).await?.unwrap();
        assert_eq!(own.holder_name, "Bapak B");

        assert!(resolve_payee(&db, 999).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_effective_payee_falls_back_per_field() -> Result<()> {
        let db = setup_test_db().await?;
        let target = create_custom_recipient(&db, "Target", None, Some("999"), None).await?;
        let source = create_custom_recipient(&db, "Source", Some("BCA"), Some("111"), None).await?;

        let payee = effective_payee(&source, Some(&target));
        assert_eq!(payee.holder_name, "Target");
        assert_eq!(payee.bank_name.as_deref(), Some("BCA"));
        assert_eq!(payee.account_number.as_deref(), Some("999"));
        Ok(())
    }

    #[tokio::test]
    async fn test_recipient_details() -> Result<()> {
        let db = setup_test_db().await?;
        let b = create_test_recipient(&db, "Bapak").await?;
        let mut new = NewRecipient::new("Ibu");
        new.transfer_to_id = Some(b.id);
        let a = create_recipient(&db, new).await?;
        create_family_group(&db, &[a.id, b.id]).await?;

        let details = get_recipient_details(&db, a.id).await?.unwrap();
        assert_eq!(details.transfer_to_name.as_deref(), Some("Bapak"));
        assert_eq!(details.family_members, ["Bapak"]);

        assert!(get_recipient_details(&db, 999).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_family_group_ids_are_never_reused() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_recipient(&db, "A").await?;
        let b = create_test_recipient(&db, "B").await?;
        let c = create_test_recipient(&db, "C").await?;

        assert_eq!(next_family_group_id(&db).await?, 1);

        let (first, changed) = create_family_group(&db, &[a.id, b.id]).await?;
        assert_eq!(first, 1);
        assert_eq!(changed, 2);
        assert_eq!(get_family_members(&db, first).await?.len(), 2);

        // Empty the group; its id stays burned
        assert_eq!(set_family_group(&db, &[a.id, b.id], None).await?, 2);
        assert!(get_family_members(&db, first).await?.is_empty());
        assert_eq!(next_family_group_id(&db).await?, 2);

        let (second, _) = create_family_group(&db, &[c.id]).await?;
        assert_eq!(second, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_direct_group_assignment_raises_high_water_mark() -> Result<()> {
        let db = setup_test_db().await?;
        let mut new = NewRecipient::new("Dewi");
        new.family_group_id = Some(5);
        let dewi = create_recipient(&db, new).await?;
        assert_eq!(next_family_group_id(&db).await?, 6);

        let eko = create_test_recipient(&db, "Eko").await?;
        let join = RecipientPatch {
            family_group_id: Some(Some(9)),
            ..Default::default()
        };
        assert!(update_recipient(&db, eko.id, join).await?);

        // Clearing both groups leaves the recorded ids burned
        for id in [dewi.id, eko.id] {
            let leave = RecipientPatch {
                family_group_id: Some(None),
                ..Default::default()
            };
            assert!(update_recipient(&db, id, leave).await?);
        }
        assert_eq!(next_family_group_id(&db).await?, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_family_group_counts_existing_rows_only() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_recipient(&db, "A").await?;
        assert_eq!(set_family_group(&db, &[a.id, 12345], Some(7)).await?, 1);
        assert_eq!(next_family_group_id(&db).await?, 8);
        assert_eq!(set_family_group(&db, &[], Some(9)).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_family_group_requires_members() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = create_family_group(&db, &[]).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_seed_recipients_links_and_groups() -> Result<()> {
        let db = setup_test_db().await?;
        let seed = |name: &str, transfer_to: Option<&str>| RecipientSeed {
            name: name.to_string(),
            bank_name: Some("BCA".to_string()),
            account_number: Some(format!("{name}-acct")),
            whatsapp: None,
            note: None,
            transfer_to: transfer_to.map(ToString::to_string),
        };
        let seeds = vec![
            seed("Ayah", None),
            seed("Ibu", Some("Ayah")),
            seed("Kakek", None),
            seed("Nenek", Some("Kakek")),
            seed("Tamu", Some("Tidak Ada")),
        ];

        assert_eq!(seed_recipients(&db, &seeds).await?, 5);
        assert_eq!(seed_recipients(&db, &seeds).await?, 0);

        let ibu = find_active_by_name(&db, "Ibu").await?.unwrap();
        let ayah = find_active_by_name(&db, "Ayah").await?.unwrap();
        assert_eq!(ibu.transfer_to_id, Some(ayah.id));
        assert!(ibu.family_group_id.is_some());
        assert_eq!(ibu.family_group_id, ayah.family_group_id);

        let nenek = find_active_by_name(&db, "Nenek").await?.unwrap();
        let kakek = find_active_by_name(&db, "Kakek").await?.unwrap();
        assert_eq!(nenek.family_group_id, kakek.family_group_id);
        assert_ne!(nenek.family_group_id, ibu.family_group_id);

        let tamu = find_active_by_name(&db, "Tamu").await?.unwrap();
        assert_eq!(tamu.transfer_to_id, None);
        assert_eq!(tamu.family_group_id, None);
        Ok(())
    }
}
