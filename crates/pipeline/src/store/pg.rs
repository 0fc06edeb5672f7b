//! Postgres implementation of the store seams.
//!
//! Head mutations lock the definition row `FOR UPDATE`; job creation
//! share-locks the selected definitions so no save can move a latest
//! version between selection and task insert; every task, retry and cancel
//! transition locks the job row `FOR UPDATE` before reading its tasks.

use async_trait::async_trait;
use chartops_core::error::CoreError;
use chartops_core::throughput::FinishedTask;
use chartops_core::types::{DbId, Timestamp};
use chartops_db::models::build_job::BuildJob;
use chartops_db::models::build_task::BuildTask;
use chartops_db::models::chart_definition::{ChartDefinition, DefinitionContent};
use chartops_db::models::chart_version::ChartVersion;
use chartops_db::models::status::{BuildTaskStatus, BuildTriggerType};
use chartops_db::repositories::{
    BuildJobRepo, BuildTaskRepo, ChartDefinitionRepo, ChartVersionRepo,
};
use chartops_db::DbPool;
use chrono::Utc;

use super::{BuildScope, BuildStore, LedgerStore, TaskUpdate};
use crate::error::PipelineResult;
use crate::revision::{self, Revision};
use crate::transitions;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Append the revision's snapshots, then rewrite the head.
async fn write_revision(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    revision: &Revision,
) -> Result<ChartDefinition, sqlx::Error> {
    for version in &revision.versions {
        ChartVersionRepo::insert(&mut **tx, version).await?;
    }
    ChartDefinitionRepo::update_head(&mut **tx, &revision.head).await
}

/// Lock a job and load its tasks in insertion order.
async fn lock_job(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    job_id: DbId,
) -> PipelineResult<(BuildJob, Vec<BuildTask>)> {
    let job = BuildJobRepo::find_for_update(&mut **tx, job_id)
        .await?
        .ok_or(CoreError::not_found("build_job", job_id))?;
    let tasks = BuildTaskRepo::list_by_job(&mut **tx, job_id).await?;
    Ok((job, tasks))
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn find_definition(&self, id: DbId) -> PipelineResult<Option<ChartDefinition>> {
        Ok(ChartDefinitionRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_definitions(&self, include_archived: bool) -> PipelineResult<Vec<ChartDefinition>> {
        Ok(ChartDefinitionRepo::list(&self.pool, include_archived).await?)
    }

    async fn insert_definition(
        &self,
        content: &DefinitionContent,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        Ok(ChartDefinitionRepo::insert(&self.pool, content, user_id).await?)
    }

    async fn save_definition(
        &self,
        id: DbId,
        content: DefinitionContent,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        let mut tx = self.pool.begin().await?;
        let current = ChartDefinitionRepo::find_for_update(&mut *tx, id)
            .await?
            .ok_or(CoreError::not_found("chart_definition", id))?;

        let revision = revision::plan_save(&current, content, user_id, Utc::now());
        let head = write_revision(&mut tx, &revision).await?;

        tx.commit().await?;
        Ok(head)
    }

    async fn rollback_definition(
        &self,
        id: DbId,
        version_number: i32,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        let mut tx = self.pool.begin().await?;
        let current = ChartDefinitionRepo::find_for_update(&mut *tx, id)
            .await?
            .ok_or(CoreError::not_found("chart_definition", id))?;
        let target = ChartVersionRepo::find_by_number(&mut *tx, id, version_number)
            .await?
            .ok_or(CoreError::not_found("chart_version", DbId::from(version_number)))?;

        let revision = revision::plan_rollback(&current, &target, user_id, Utc::now());
        let head = write_revision(&mut tx, &revision).await?;

        tx.commit().await?;
        Ok(head)
    }

    async fn list_versions(&self, id: DbId) -> PipelineResult<Vec<ChartVersion>> {
        Ok(ChartVersionRepo::list_by_definition(&self.pool, id).await?)
    }

    async fn find_version(&self, id: DbId, version_number: i32) -> PipelineResult<Option<ChartVersion>> {
        Ok(ChartVersionRepo::find_by_number(&self.pool, id, version_number).await?)
    }

    async fn approve_definition(
        &self,
        id: DbId,
        expected_version: i32,
        user_id: Option<DbId>,
    ) -> PipelineResult<Option<ChartDefinition>> {
        Ok(ChartDefinitionRepo::approve_at_version(&self.pool, id, expected_version, user_id).await?)
    }

    async fn set_archived(
        &self,
        id: DbId,
        archived: bool,
        user_id: Option<DbId>,
    ) -> PipelineResult<Option<ChartDefinition>> {
        Ok(ChartDefinitionRepo::set_archived(&self.pool, id, archived, user_id).await?)
    }
}

#[async_trait]
impl BuildStore for PgStore {
    async fn create_job(
        &self,
        trigger: BuildTriggerType,
        requested_by: Option<DbId>,
        scope: &BuildScope,
    ) -> PipelineResult<(BuildJob, Vec<BuildTask>)> {
        let mut tx = self.pool.begin().await?;

        let definitions = match scope {
            BuildScope::Approved => ChartDefinitionRepo::lock_approved(&mut *tx).await?,
            BuildScope::Selected(ids) => ChartDefinitionRepo::lock_selected(&mut *tx, ids).await?,
        };
        let ids: Vec<DbId> = definitions.iter().map(|d| d.id).collect();
        let latest = ChartVersionRepo::latest_for_definitions(&mut *tx, &ids).await?;

        let planned = transitions::plan_tasks(&definitions, &latest);
        if planned.is_empty() {
            return Err(CoreError::InvalidOperation(
                "No chart definitions are eligible for this build".to_string(),
            )
            .into());
        }

        let job = BuildJobRepo::insert(&mut *tx, trigger, requested_by).await?;
        let tasks = BuildTaskRepo::insert_many(&mut *tx, job.id, &planned).await?;

        tx.commit().await?;
        Ok((job, tasks))
    }

    async fn update_task(
        &self,
        task_id: DbId,
        status: BuildTaskStatus,
        error_payload: Option<serde_json::Value>,
    ) -> PipelineResult<TaskUpdate> {
        let mut tx = self.pool.begin().await?;
        let job_id = BuildTaskRepo::job_id_of(&mut *tx, task_id)
            .await?
            .ok_or(CoreError::not_found("build_task", task_id))?;
        let (mut job, mut tasks) = lock_job(&mut tx, job_id).await?;

        let transition = transitions::apply_task_update(
            &mut job,
            &mut tasks,
            task_id,
            status,
            error_payload,
            Utc::now(),
        )?;

        let mut task = tasks.swap_remove(transition.task_index);
        if transition.outcome == transitions::TaskOutcome::Applied {
            task = BuildTaskRepo::save_state(&mut *tx, &task).await?;
            job = BuildJobRepo::save_state(&mut *tx, &job).await?;
        }

        tx.commit().await?;
        Ok(TaskUpdate {
            job,
            task,
            transition,
        })
    }

    async fn retry_failed(&self, job_id: DbId) -> PipelineResult<(BuildJob, usize)> {
        let mut tx = self.pool.begin().await?;
        let (mut job, mut tasks) = lock_job(&mut tx, job_id).await?;

        let reset = transitions::apply_retry(&mut job, &mut tasks, Utc::now())?;
        if !reset.is_empty() {
            for &index in &reset {
                BuildTaskRepo::save_state(&mut *tx, &tasks[index]).await?;
            }
            job = BuildJobRepo::save_state(&mut *tx, &job).await?;
        }

        tx.commit().await?;
        Ok((job, reset.len()))
    }

    async fn cancel_job(&self, job_id: DbId) -> PipelineResult<(BuildJob, usize)> {
        let mut tx = self.pool.begin().await?;
        let (mut job, mut tasks) = lock_job(&mut tx, job_id).await?;

        let cancelled = transitions::apply_cancel(&mut job, &mut tasks, Utc::now())?;
        for &index in &cancelled {
            BuildTaskRepo::save_state(&mut *tx, &tasks[index]).await?;
        }
        let job = BuildJobRepo::save_state(&mut *tx, &job).await?;

        tx.commit().await?;
        Ok((job, cancelled.len()))
    }

    async fn find_job(&self, id: DbId) -> PipelineResult<Option<BuildJob>> {
        Ok(BuildJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn job_tasks(&self, job_id: DbId) -> PipelineResult<Vec<BuildTask>> {
        Ok(BuildTaskRepo::list_by_job(&self.pool, job_id).await?)
    }

    async fn list_jobs(&self, limit: i64) -> PipelineResult<Vec<BuildJob>> {
        Ok(BuildJobRepo::list_recent(&self.pool, limit).await?)
    }

    async fn pending_tasks(&self, limit: i64) -> PipelineResult<Vec<BuildTask>> {
        Ok(BuildTaskRepo::list_pending(&self.pool, limit).await?)
    }

    async fn throughput_samples(&self, since: Timestamp) -> PipelineResult<(i64, Vec<FinishedTask>)> {
        let jobs_created = BuildJobRepo::count_requested_since(&self.pool, since).await?;
        let finished = BuildTaskRepo::finished_since(&self.pool, since)
            .await?
            .into_iter()
            .map(|(status_id, started_at, completed_at)| FinishedTask {
                succeeded: status_id == BuildTaskStatus::Completed.id(),
                started_at,
                completed_at,
            })
            .collect();
        Ok((jobs_created, finished))
    }
}
