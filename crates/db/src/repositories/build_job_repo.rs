//! Repository for the `build_jobs` table.
//!
//! Uses `BuildJobStatus` from `models::status` for every status literal.

use chartops_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::build_job::BuildJob;
use crate::models::status::{BuildJobStatus, BuildTriggerType};

/// Column list for `build_jobs` queries.
const COLUMNS: &str = "\
    id, trigger_type_id, requested_by, requested_at, status_id, \
    started_at, completed_at, success_count, failure_count, summary, \
    created_at, updated_at";

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Provides inserts, locked reads and state write-back for build jobs.
pub struct BuildJobRepo;

impl BuildJobRepo {
    /// Create a new pending job with zeroed counters.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        trigger: BuildTriggerType,
        requested_by: Option<DbId>,
    ) -> Result<BuildJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO build_jobs (trigger_type_id, requested_by, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BuildJob>(&query)
            .bind(trigger.id())
            .bind(requested_by)
            .bind(BuildJobStatus::Pending.id())
            .fetch_one(executor)
            .await
    }

    /// Find a build job by ID.
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<BuildJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM build_jobs WHERE id = $1");
        sqlx::query_as::<_, BuildJob>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a build job and lock its row until the transaction ends.
    ///
    /// Every task transition takes this lock first, which serializes all
    /// transitions within one job.
    pub async fn find_for_update<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<BuildJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM build_jobs WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, BuildJob>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Write back status, timestamps, counters and summary.
    pub async fn save_state<'e>(
        executor: impl PgExecutor<'e>,
        job: &BuildJob,
    ) -> Result<BuildJob, sqlx::Error> {
        let query = format!(
            "UPDATE build_jobs SET \
                status_id = $2, started_at = $3, completed_at = $4, \
                success_count = $5, failure_count = $6, summary = $7, updated_at = $8 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BuildJob>(&query)
            .bind(job.id)
            .bind(job.status_id)
            .bind(job.started_at)
            .bind(job.completed_at)
            .bind(job.success_count)
            .bind(job.failure_count)
            .bind(&job.summary)
            .bind(job.updated_at)
            .fetch_one(executor)
            .await
    }

    /// Most recent jobs first. `limit` is clamped to `1..=MAX_LIMIT`.
    pub async fn list_recent<'e>(
        executor: impl PgExecutor<'e>,
        limit: i64,
    ) -> Result<Vec<BuildJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM build_jobs \
             ORDER BY requested_at DESC, id DESC \
             LIMIT $1"
        );
        sqlx::query_as::<_, BuildJob>(&query)
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(executor)
            .await
    }

    /// Number of jobs requested at or after `since`.
    pub async fn count_requested_since<'e>(
        executor: impl PgExecutor<'e>,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM build_jobs WHERE requested_at >= $1")
                .bind(since)
                .fetch_one(executor)
                .await?;
        Ok(count)
    }
}
