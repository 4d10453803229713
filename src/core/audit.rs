//! Audit trail for ledger rows.
//!
//! Status changes on transactions, whether made by a user or by the ledger
//! sync, leave one `audit_logs` row with JSON snapshots of the row before and
//! after the change.

use crate::{
    entities::{AuditLog, audit_log},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use serde::Serialize;

/// Entity name recorded for ledger rows
pub const TRANSACTION_ENTITY: &str = "transactions";

/// Writes one audit row. `before`/`after` are serialized with `serde_json`.
pub async fn record_audit<C, B, A>(
    conn: &C,
    actor_id: Option<i64>,
    entity: &str,
    entity_id: i64,
    action: &str,
    before: Option<&B>,
    after: Option<&A>,
) -> Result<audit_log::Model>
where
    C: ConnectionTrait,
    B: Serialize + Sync,
    A: Serialize + Sync,
{
    let before_json = before.map(serde_json::to_string).transpose()?;
    let after_json = after.map(serde_json::to_string).transpose()?;

    let row = audit_log::ActiveModel {
        actor_id: Set(actor_id),
        entity: Set(entity.to_string()),
        entity_id: Set(entity_id),
        action: Set(action.to_string()),
        before_json: Set(before_json),
        after_json: Set(after_json),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    Ok(row.insert(conn).await?)
}

/// Audit rows for one entity instance, oldest first.
pub async fn get_audit_trail(
    db: &DatabaseConnection,
    entity: &str,
    entity_id: i64,
) -> Result<Vec<audit_log::Model>> {
    AuditLog::find()
        .filter(audit_log::Column::Entity.eq(entity))
        .filter(audit_log::Column::EntityId.eq(entity_id))
        .order_by_asc(audit_log::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
