//! Repository for the `audit_logs` table.

use sqlx::PgExecutor;

use crate::models::audit::{AuditLog, CreateAuditLog};

/// Column list for `audit_logs` SELECT queries.
const COLUMNS: &str = "\
    id, actor_id, action_type, entity_type, entity_id, details_json, created_at";

/// Append-only access to audit logs.
pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Append one audit entry.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        entry: &CreateAuditLog,
    ) -> Result<AuditLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_logs (actor_id, action_type, entity_type, entity_id, details_json) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLog>(&query)
            .bind(entry.actor_id)
            .bind(&entry.action_type)
            .bind(&entry.entity_type)
            .bind(entry.entity_id)
            .bind(&entry.details_json)
            .fetch_one(executor)
            .await
    }
}
