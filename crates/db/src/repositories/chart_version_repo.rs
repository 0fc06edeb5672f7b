//! Repository for the append-only `chart_versions` table.

use chartops_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::chart_version::{ChartVersion, NewChartVersion};

/// Column list for `chart_versions` queries.
const COLUMNS: &str = "\
    id, chart_definition_id, version_number, snapshot, \
    approved, approved_by, approved_at, diff_summary, \
    rollback_source_version_number, created_by, created_at";

/// Provides inserts and reads for chart version snapshots. There is no
/// update or delete: snapshots are immutable.
pub struct ChartVersionRepo;

impl ChartVersionRepo {
    /// Append one snapshot row.
    ///
    /// Fails with a unique violation if `(chart_definition_id,
    /// version_number)` already exists.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        input: &NewChartVersion,
    ) -> Result<ChartVersion, sqlx::Error> {
        let query = format!(
            "INSERT INTO chart_versions \
                (chart_definition_id, version_number, snapshot, approved, approved_by, \
                 approved_at, diff_summary, rollback_source_version_number, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChartVersion>(&query)
            .bind(input.chart_definition_id)
            .bind(input.version_number)
            .bind(Json(&input.snapshot))
            .bind(input.approved)
            .bind(input.approved_by)
            .bind(input.approved_at)
            .bind(&input.diff_summary)
            .bind(input.rollback_source_version_number)
            .bind(input.created_by)
            .fetch_one(executor)
            .await
    }

    /// All snapshots of a definition, highest version first.
    pub async fn list_by_definition<'e>(
        executor: impl PgExecutor<'e>,
        chart_definition_id: DbId,
    ) -> Result<Vec<ChartVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chart_versions \
             WHERE chart_definition_id = $1 \
             ORDER BY version_number DESC"
        );
        sqlx::query_as::<_, ChartVersion>(&query)
            .bind(chart_definition_id)
            .fetch_all(executor)
            .await
    }

    /// Find one snapshot by its version number.
    pub async fn find_by_number<'e>(
        executor: impl PgExecutor<'e>,
        chart_definition_id: DbId,
        version_number: i32,
    ) -> Result<Option<ChartVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM chart_versions \
             WHERE chart_definition_id = $1 AND version_number = $2"
        );
        sqlx::query_as::<_, ChartVersion>(&query)
            .bind(chart_definition_id)
            .bind(version_number)
            .fetch_optional(executor)
            .await
    }

    /// The highest-numbered snapshot of each of `chart_definition_ids`.
    /// Definitions without snapshots are absent from the result.
    pub async fn latest_for_definitions<'e>(
        executor: impl PgExecutor<'e>,
        chart_definition_ids: &[DbId],
    ) -> Result<Vec<ChartVersion>, sqlx::Error> {
        let query = format!(
            "SELECT DISTINCT ON (chart_definition_id) {COLUMNS} FROM chart_versions \
             WHERE chart_definition_id = ANY($1) \
             ORDER BY chart_definition_id, version_number DESC"
        );
        sqlx::query_as::<_, ChartVersion>(&query)
            .bind(chart_definition_ids)
            .fetch_all(executor)
            .await
    }
}
