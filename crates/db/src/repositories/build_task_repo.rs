//! Repository for the `build_tasks` table.

use chartops_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::build_task::{BuildTask, NewBuildTask};
use crate::models::status::{BuildTaskStatus, StatusId};

/// Column list for `build_tasks` queries.
const COLUMNS: &str = "\
    id, build_job_id, chart_definition_id, chart_version_id, version_number, \
    priority, status_id, started_at, completed_at, error_payload, \
    created_at, updated_at";

/// Maximum page size for pending-task polling.
pub const MAX_LIMIT: i64 = 100;

/// Provides inserts, reads and state write-back for build tasks.
pub struct BuildTaskRepo;

impl BuildTaskRepo {
    /// Insert every task of a job in one statement, all `Pending`.
    ///
    /// Returned rows are ordered by ID, which is insertion order.
    pub async fn insert_many<'e>(
        executor: impl PgExecutor<'e>,
        build_job_id: DbId,
        tasks: &[NewBuildTask],
    ) -> Result<Vec<BuildTask>, sqlx::Error> {
        let definition_ids: Vec<DbId> = tasks.iter().map(|t| t.chart_definition_id).collect();
        let version_ids: Vec<DbId> = tasks.iter().map(|t| t.chart_version_id).collect();
        let version_numbers: Vec<i32> = tasks.iter().map(|t| t.version_number).collect();
        let priorities: Vec<i32> = tasks.iter().map(|t| t.priority).collect();

        let query = format!(
            "WITH inserted AS ( \
                INSERT INTO build_tasks \
                    (build_job_id, chart_definition_id, chart_version_id, version_number, \
                     priority, status_id) \
                SELECT $1, t.definition_id, t.version_id, t.version_number, t.priority, $6 \
                FROM UNNEST($2::BIGINT[], $3::BIGINT[], $4::INTEGER[], $5::INTEGER[]) \
                    WITH ORDINALITY AS t(definition_id, version_id, version_number, priority, ord) \
                ORDER BY t.ord \
                RETURNING {COLUMNS} \
             ) \
             SELECT {COLUMNS} FROM inserted ORDER BY id"
        );
        sqlx::query_as::<_, BuildTask>(&query)
            .bind(build_job_id)
            .bind(&definition_ids)
            .bind(&version_ids)
            .bind(&version_numbers)
            .bind(&priorities)
            .bind(BuildTaskStatus::Pending.id())
            .fetch_all(executor)
            .await
    }

    /// Find a build task by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<BuildTask>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM build_tasks WHERE id = $1");
        sqlx::query_as::<_, BuildTask>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// The parent job of a task, used to take the job lock before the task
    /// itself is read.
    pub async fn job_id_of<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<DbId>, sqlx::Error> {
        let row: Option<(DbId,)> = sqlx::query_as("SELECT build_job_id FROM build_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row.map(|(job_id,)| job_id))
    }

    /// Every task of a job in insertion order.
    pub async fn list_by_job<'e>(
        executor: impl PgExecutor<'e>,
        build_job_id: DbId,
    ) -> Result<Vec<BuildTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM build_tasks WHERE build_job_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, BuildTask>(&query)
            .bind(build_job_id)
            .fetch_all(executor)
            .await
    }

    /// Write back status, timestamps and error payload.
    pub async fn save_state<'e>(
        executor: impl PgExecutor<'e>,
        task: &BuildTask,
    ) -> Result<BuildTask, sqlx::Error> {
        let query = format!(
            "UPDATE build_tasks SET \
                status_id = $2, started_at = $3, completed_at = $4, \
                error_payload = $5, updated_at = $6 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BuildTask>(&query)
            .bind(task.id)
            .bind(task.status_id)
            .bind(task.started_at)
            .bind(task.completed_at)
            .bind(&task.error_payload)
            .bind(task.updated_at)
            .fetch_one(executor)
            .await
    }

    /// Claimable tasks, highest priority first, ties in insertion order.
    pub async fn list_pending<'e>(
        executor: impl PgExecutor<'e>,
        limit: i64,
    ) -> Result<Vec<BuildTask>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM build_tasks \
             WHERE status_id = $1 \
             ORDER BY priority DESC, id ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, BuildTask>(&query)
            .bind(BuildTaskStatus::Pending.id())
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(executor)
            .await
    }

    /// `(status_id, started_at, completed_at)` of every task that reached
    /// `Completed` or `Failed` at or after `since`.
    pub async fn finished_since<'e>(
        executor: impl PgExecutor<'e>,
        since: Timestamp,
    ) -> Result<Vec<(StatusId, Option<Timestamp>, Timestamp)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT status_id, started_at, completed_at FROM build_tasks \
             WHERE completed_at >= $1 AND status_id IN ($2, $3)",
        )
        .bind(since)
        .bind(BuildTaskStatus::Completed.id())
        .bind(BuildTaskStatus::Failed.id())
        .fetch_all(executor)
        .await
    }
}
