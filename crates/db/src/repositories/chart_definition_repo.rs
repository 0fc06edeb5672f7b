//! Repository for the `chart_definitions` table.

use chartops_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::chart_definition::{ChartDefinition, DefinitionContent};

/// Column list for `chart_definitions` queries.
const COLUMNS: &str = "\
    id, name, description, dataset_id, tags, \
    filter_payload, visual_payload, calculation_payload, \
    version_number, auto_approved, approved_by, approved_at, archived, \
    created_by, modified_by, created_at, updated_at";

/// Provides reads, head inserts and head rewrites for chart definitions.
pub struct ChartDefinitionRepo;

impl ChartDefinitionRepo {
    /// Insert a brand-new head at version 1.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        content: &DefinitionContent,
        user_id: Option<DbId>,
    ) -> Result<ChartDefinition, sqlx::Error> {
        let query = format!(
            "INSERT INTO chart_definitions \
                (name, description, dataset_id, tags, filter_payload, visual_payload, \
                 calculation_payload, version_number, created_by, modified_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(&content.name)
            .bind(&content.description)
            .bind(content.dataset_id)
            .bind(&content.tags)
            .bind(&content.filter_payload)
            .bind(&content.visual_payload)
            .bind(&content.calculation_payload)
            .bind(user_id)
            .fetch_one(executor)
            .await
    }

    /// Find a chart definition by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<ChartDefinition>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chart_definitions WHERE id = $1");
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a chart definition and lock its row until the transaction ends.
    pub async fn find_for_update<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<ChartDefinition>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chart_definitions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List definitions, newest first.
    pub async fn list<'e>(
        executor: impl PgExecutor<'e>,
        include_archived: bool,
    ) -> Result<Vec<ChartDefinition>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chart_definitions \
             WHERE $1 OR NOT archived \
             ORDER BY id DESC"
        );
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(include_archived)
            .fetch_all(executor)
            .await
    }

    /// Non-archived, auto-approved definitions, share-locked so no save can
    /// move their versions until the transaction ends.
    pub async fn lock_approved<'e>(
        executor: impl PgExecutor<'e>,
    ) -> Result<Vec<ChartDefinition>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chart_definitions \
             WHERE auto_approved AND NOT archived \
             ORDER BY id \
             FOR SHARE"
        );
        sqlx::query_as::<_, ChartDefinition>(&query)
            .fetch_all(executor)
            .await
    }

    /// Non-archived definitions among `ids`, share-locked like
    /// [`Self::lock_approved`]. Approval is not required.
    pub async fn lock_selected<'e>(
        executor: impl PgExecutor<'e>,
        ids: &[DbId],
    ) -> Result<Vec<ChartDefinition>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chart_definitions \
             WHERE id = ANY($1) AND NOT archived \
             ORDER BY id \
             FOR SHARE"
        );
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(ids)
            .fetch_all(executor)
            .await
    }

    /// Rewrite every mutable column of a head from `head`.
    pub async fn update_head<'e>(
        executor: impl PgExecutor<'e>,
        head: &ChartDefinition,
    ) -> Result<ChartDefinition, sqlx::Error> {
        let query = format!(
            "UPDATE chart_definitions SET \
                name = $2, description = $3, dataset_id = $4, tags = $5, \
                filter_payload = $6, visual_payload = $7, calculation_payload = $8, \
                version_number = $9, auto_approved = $10, approved_by = $11, \
                approved_at = $12, archived = $13, modified_by = $14, updated_at = $15 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(head.id)
            .bind(&head.name)
            .bind(&head.description)
            .bind(head.dataset_id)
            .bind(&head.tags)
            .bind(&head.filter_payload)
            .bind(&head.visual_payload)
            .bind(&head.calculation_payload)
            .bind(head.version_number)
            .bind(head.auto_approved)
            .bind(head.approved_by)
            .bind(head.approved_at)
            .bind(head.archived)
            .bind(head.modified_by)
            .bind(head.updated_at)
            .fetch_one(executor)
            .await
    }

    /// Grant auto-approval, but only while the head is still at
    /// `expected_version`. Returns `None` if the head moved or is missing.
    pub async fn approve_at_version<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        expected_version: i32,
        user_id: Option<DbId>,
    ) -> Result<Option<ChartDefinition>, sqlx::Error> {
        let query = format!(
            "UPDATE chart_definitions SET \
                auto_approved = true, approved_by = $3, approved_at = NOW(), \
                modified_by = $3, updated_at = NOW() \
             WHERE id = $1 AND version_number = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Set or clear the archival flag. Archival is not content, so the
    /// version number is left alone.
    pub async fn set_archived<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
        archived: bool,
        user_id: Option<DbId>,
    ) -> Result<Option<ChartDefinition>, sqlx::Error> {
        let query = format!(
            "UPDATE chart_definitions SET \
                archived = $2, modified_by = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChartDefinition>(&query)
            .bind(id)
            .bind(archived)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }
}
