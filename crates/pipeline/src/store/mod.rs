//! Persistence seams for the control plane.
//!
//! Each mutating method is one atomic unit: the implementation locks the
//! definition head or the build job, loads what the pure rules in
//! [`crate::revision`] / [`crate::transitions`] need, applies them and writes
//! the result back before releasing the lock.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chartops_core::throughput::FinishedTask;
use chartops_core::types::{DbId, Timestamp};
use chartops_db::models::build_job::BuildJob;
use chartops_db::models::build_task::BuildTask;
use chartops_db::models::chart_definition::{ChartDefinition, DefinitionContent};
use chartops_db::models::chart_version::ChartVersion;
use chartops_db::models::status::{BuildTaskStatus, BuildTriggerType};

use crate::error::PipelineResult;
use crate::transitions::TaskTransition;

/// Which definitions a new build job targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildScope {
    /// Every non-archived, auto-approved definition.
    Approved,
    /// Non-archived definitions among these IDs, approved or not.
    Selected(Vec<DbId>),
}

/// Result of a task status report after it was written back.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub job: BuildJob,
    pub task: BuildTask,
    pub transition: TaskTransition,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_definition(&self, id: DbId) -> PipelineResult<Option<ChartDefinition>>;

    async fn list_definitions(&self, include_archived: bool) -> PipelineResult<Vec<ChartDefinition>>;

    /// Insert a new head at version 1.
    async fn insert_definition(
        &self,
        content: &DefinitionContent,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition>;

    /// Snapshot the current head, then apply `content` and bump the version.
    async fn save_definition(
        &self,
        id: DbId,
        content: DefinitionContent,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition>;

    /// Restore the content of snapshot `version_number` onto the head.
    async fn rollback_definition(
        &self,
        id: DbId,
        version_number: i32,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition>;

    /// Snapshots of a definition, highest version first.
    async fn list_versions(&self, id: DbId) -> PipelineResult<Vec<ChartVersion>>;

    async fn find_version(&self, id: DbId, version_number: i32) -> PipelineResult<Option<ChartVersion>>;

    /// Grant auto-approval if the head is still at `expected_version`.
    async fn approve_definition(
        &self,
        id: DbId,
        expected_version: i32,
        user_id: Option<DbId>,
    ) -> PipelineResult<Option<ChartDefinition>>;

    async fn set_archived(
        &self,
        id: DbId,
        archived: bool,
        user_id: Option<DbId>,
    ) -> PipelineResult<Option<ChartDefinition>>;
}

#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Select targets and create the job with one pending task each.
    /// Fails with an invalid operation when nothing is selectable.
    async fn create_job(
        &self,
        trigger: BuildTriggerType,
        requested_by: Option<DbId>,
        scope: &BuildScope,
    ) -> PipelineResult<(BuildJob, Vec<BuildTask>)>;

    async fn update_task(
        &self,
        task_id: DbId,
        status: BuildTaskStatus,
        error_payload: Option<serde_json::Value>,
    ) -> PipelineResult<TaskUpdate>;

    /// Requeue failed tasks; returns the job and how many were reset.
    async fn retry_failed(&self, job_id: DbId) -> PipelineResult<(BuildJob, usize)>;

    /// Cancel a pending or running job; returns the job and how many tasks
    /// were cancelled.
    async fn cancel_job(&self, job_id: DbId) -> PipelineResult<(BuildJob, usize)>;

    async fn find_job(&self, id: DbId) -> PipelineResult<Option<BuildJob>>;

    async fn job_tasks(&self, job_id: DbId) -> PipelineResult<Vec<BuildTask>>;

    /// Newest jobs first.
    async fn list_jobs(&self, limit: i64) -> PipelineResult<Vec<BuildJob>>;

    /// Pending tasks by priority descending, then insertion order.
    async fn pending_tasks(&self, limit: i64) -> PipelineResult<Vec<BuildTask>>;

    /// Jobs requested since `since` and tasks finished (completed or failed)
    /// since `since`.
    async fn throughput_samples(&self, since: Timestamp) -> PipelineResult<(i64, Vec<FinishedTask>)>;
}
