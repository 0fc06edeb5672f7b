//! Audit log entity models and DTOs.
//!
//! Audit logs have no `updated_at` field (immutable records).

use chartops_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A single audit log entry. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: DbId,
    pub actor_id: Option<DbId>,
    pub action_type: String,
    pub entity_type: String,
    pub entity_id: DbId,
    pub details_json: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// DTO for inserting a new audit log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAuditLog {
    pub actor_id: Option<DbId>,
    pub action_type: String,
    pub entity_type: String,
    pub entity_id: DbId,
    pub details_json: Option<serde_json::Value>,
}
