//! Audit log entity - before/after snapshots of ledger status changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Actor who made the change, `None` for automatic changes
    pub actor_id: Option<i64>,
    /// Table name of the changed entity, e.g. `"transactions"`
    pub entity: String,
    /// Primary key of the changed row
    pub entity_id: i64,
    /// What happened, e.g. `"approve"`, `"void"`
    pub action: String,
    /// JSON snapshot before the change
    pub before_json: Option<String>,
    /// JSON snapshot after the change
    pub after_json: Option<String>,
    /// When the change happened
    pub created_at: DateTimeUtc,
}

/// `AuditLog` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
