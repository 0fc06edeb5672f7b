//! In-memory implementation of the store seams.
//!
//! One mutex guards all state, so every method is trivially atomic with
//! respect to every other. Used by tests and local tooling.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chartops_core::error::CoreError;
use chartops_core::throughput::FinishedTask;
use chartops_core::types::{DbId, Timestamp};
use chartops_db::models::build_job::BuildJob;
use chartops_db::models::build_task::BuildTask;
use chartops_db::models::chart_definition::{ChartDefinition, DefinitionContent};
use chartops_db::models::chart_version::{ChartVersion, NewChartVersion};
use chartops_db::models::status::{BuildJobStatus, BuildTaskStatus, BuildTriggerType};
use chartops_db::repositories::{build_job_repo, build_task_repo};
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::Mutex;

use super::{BuildScope, BuildStore, LedgerStore, TaskUpdate};
use crate::error::PipelineResult;
use crate::revision::{self, Revision};
use crate::transitions::{self, TaskOutcome};

#[derive(Default)]
struct State {
    last_id: DbId,
    definitions: BTreeMap<DbId, ChartDefinition>,
    versions: Vec<ChartVersion>,
    jobs: BTreeMap<DbId, BuildJob>,
    tasks: BTreeMap<DbId, BuildTask>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn head(&self, id: DbId) -> Result<&ChartDefinition, CoreError> {
        self.definitions
            .get(&id)
            .ok_or(CoreError::not_found("chart_definition", id))
    }

    fn version(&self, id: DbId, version_number: i32) -> Option<&ChartVersion> {
        self.versions
            .iter()
            .find(|v| v.chart_definition_id == id && v.version_number == version_number)
    }

    fn append_version(&mut self, input: NewChartVersion, now: Timestamp) -> Result<(), CoreError> {
        if self.version(input.chart_definition_id, input.version_number).is_some() {
            return Err(CoreError::Internal(format!(
                "Version {} of chart definition {} already exists",
                input.version_number, input.chart_definition_id
            )));
        }
        let id = self.next_id();
        self.versions.push(ChartVersion {
            id,
            chart_definition_id: input.chart_definition_id,
            version_number: input.version_number,
            snapshot: Json(input.snapshot),
            approved: input.approved,
            approved_by: input.approved_by,
            approved_at: input.approved_at,
            diff_summary: input.diff_summary,
            rollback_source_version_number: input.rollback_source_version_number,
            created_by: input.created_by,
            created_at: now,
        });
        Ok(())
    }

    fn write_revision(&mut self, revision: Revision, now: Timestamp) -> Result<ChartDefinition, CoreError> {
        for version in revision.versions {
            self.append_version(version, now)?;
        }
        self.definitions.insert(revision.head.id, revision.head.clone());
        Ok(revision.head)
    }

    /// Take a job and its tasks (insertion order) out for mutation.
    fn job_with_tasks(&self, job_id: DbId) -> Result<(BuildJob, Vec<BuildTask>), CoreError> {
        let job = self
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(CoreError::not_found("build_job", job_id))?;
        let tasks = self
            .tasks
            .values()
            .filter(|t| t.build_job_id == job_id)
            .cloned()
            .collect();
        Ok((job, tasks))
    }

    fn put_job(&mut self, job: BuildJob, tasks: Vec<BuildTask>) {
        for task in tasks {
            self.tasks.insert(task.id, task);
        }
        self.jobs.insert(job.id, job);
    }
}

/// Same bounds the SQL repositories apply to `LIMIT`.
fn clamp_limit(limit: i64, max: i64) -> usize {
    limit.clamp(1, max) as usize
}

/// Store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_definition(&self, id: DbId) -> PipelineResult<Option<ChartDefinition>> {
        Ok(self.state.lock().await.definitions.get(&id).cloned())
    }

    async fn list_definitions(&self, include_archived: bool) -> PipelineResult<Vec<ChartDefinition>> {
        let state = self.state.lock().await;
        Ok(state
            .definitions
            .values()
            .rev()
            .filter(|d| include_archived || !d.archived)
            .cloned()
            .collect())
    }

    async fn insert_definition(
        &self,
        content: &DefinitionContent,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let definition = ChartDefinition {
            id: state.next_id(),
            name: content.name.clone(),
            description: content.description.clone(),
            dataset_id: content.dataset_id,
            tags: content.tags.clone(),
            filter_payload: content.filter_payload.clone(),
            visual_payload: content.visual_payload.clone(),
            calculation_payload: content.calculation_payload.clone(),
            version_number: 1,
            auto_approved: false,
            approved_by: None,
            approved_at: None,
            archived: false,
            created_by: user_id,
            modified_by: user_id,
            created_at: now,
            updated_at: now,
        };
        state.definitions.insert(definition.id, definition.clone());
        Ok(definition)
    }

    async fn save_definition(
        &self,
        id: DbId,
        content: DefinitionContent,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let revision = revision::plan_save(state.head(id)?, content, user_id, now);
        Ok(state.write_revision(revision, now)?)
    }

    async fn rollback_definition(
        &self,
        id: DbId,
        version_number: i32,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let current = state.head(id)?;
        let target = state
            .version(id, version_number)
            .ok_or(CoreError::not_found("chart_version", DbId::from(version_number)))?;
        let revision = revision::plan_rollback(current, target, user_id, now);
        Ok(state.write_revision(revision, now)?)
    }

    async fn list_versions(&self, id: DbId) -> PipelineResult<Vec<ChartVersion>> {
        let state = self.state.lock().await;
        let mut versions: Vec<ChartVersion> = state
            .versions
            .iter()
            .filter(|v| v.chart_definition_id == id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    async fn find_version(&self, id: DbId, version_number: i32) -> PipelineResult<Option<ChartVersion>> {
        Ok(self.state.lock().await.version(id, version_number).cloned())
    }

    async fn approve_definition(
        &self,
        id: DbId,
        expected_version: i32,
        user_id: Option<DbId>,
    ) -> PipelineResult<Option<ChartDefinition>> {
        let mut state = self.state.lock().await;
        let Some(head) = state.definitions.get_mut(&id) else {
            return Ok(None);
        };
        if head.version_number != expected_version {
            return Ok(None);
        }
        let now = Utc::now();
        head.auto_approved = true;
        head.approved_by = user_id;
        head.approved_at = Some(now);
        head.modified_by = user_id;
        head.updated_at = now;
        Ok(Some(head.clone()))
    }

    async fn set_archived(
        &self,
        id: DbId,
        archived: bool,
        user_id: Option<DbId>,
    ) -> PipelineResult<Option<ChartDefinition>> {
        let mut state = self.state.lock().await;
        Ok(state.definitions.get_mut(&id).map(|head| {
            head.archived = archived;
            head.modified_by = user_id;
            head.updated_at = Utc::now();
            head.clone()
        }))
    }
}

#[async_trait]
impl BuildStore for MemoryStore {
    async fn create_job(
        &self,
        trigger: BuildTriggerType,
        requested_by: Option<DbId>,
        scope: &BuildScope,
    ) -> PipelineResult<(BuildJob, Vec<BuildTask>)> {
        let mut state = self.state.lock().await;

        let definitions: Vec<ChartDefinition> = state
            .definitions
            .values()
            .filter(|d| !d.archived)
            .filter(|d| match scope {
                BuildScope::Approved => d.auto_approved,
                BuildScope::Selected(ids) => ids.contains(&d.id),
            })
            .cloned()
            .collect();
        let planned = transitions::plan_tasks(&definitions, &state.versions);
        if planned.is_empty() {
            return Err(CoreError::InvalidOperation(
                "No chart definitions are eligible for this build".to_string(),
            )
            .into());
        }

        let now = Utc::now();
        let job = BuildJob {
            id: state.next_id(),
            trigger_type_id: trigger.id(),
            requested_by,
            requested_at: now,
            status_id: BuildJobStatus::Pending.id(),
            started_at: None,
            completed_at: None,
            success_count: 0,
            failure_count: 0,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        let mut tasks = Vec::with_capacity(planned.len());
        for new_task in planned {
            tasks.push(BuildTask {
                id: state.next_id(),
                build_job_id: job.id,
                chart_definition_id: new_task.chart_definition_id,
                chart_version_id: new_task.chart_version_id,
                version_number: new_task.version_number,
                priority: new_task.priority,
                status_id: BuildTaskStatus::Pending.id(),
                started_at: None,
                completed_at: None,
                error_payload: None,
                created_at: now,
                updated_at: now,
            });
        }
        state.put_job(job.clone(), tasks.clone());
        Ok((job, tasks))
    }

    async fn update_task(
        &self,
        task_id: DbId,
        status: BuildTaskStatus,
        error_payload: Option<serde_json::Value>,
    ) -> PipelineResult<TaskUpdate> {
        let mut state = self.state.lock().await;
        let job_id = state
            .tasks
            .get(&task_id)
            .map(|t| t.build_job_id)
            .ok_or(CoreError::not_found("build_task", task_id))?;
        let (mut job, mut tasks) = state.job_with_tasks(job_id)?;

        let transition = transitions::apply_task_update(
            &mut job,
            &mut tasks,
            task_id,
            status,
            error_payload,
            Utc::now(),
        )?;
        let task = tasks[transition.task_index].clone();
        if transition.outcome == TaskOutcome::Applied {
            state.put_job(job.clone(), tasks);
        }

        Ok(TaskUpdate {
            job,
            task,
            transition,
        })
    }

    async fn retry_failed(&self, job_id: DbId) -> PipelineResult<(BuildJob, usize)> {
        let mut state = self.state.lock().await;
        let (mut job, mut tasks) = state.job_with_tasks(job_id)?;
        let reset = transitions::apply_retry(&mut job, &mut tasks, Utc::now())?;
        if !reset.is_empty() {
            state.put_job(job.clone(), tasks);
        }
        Ok((job, reset.len()))
    }

    async fn cancel_job(&self, job_id: DbId) -> PipelineResult<(BuildJob, usize)> {
        let mut state = self.state.lock().await;
        let (mut job, mut tasks) = state.job_with_tasks(job_id)?;
        let cancelled = transitions::apply_cancel(&mut job, &mut tasks, Utc::now())?;
        state.put_job(job.clone(), tasks);
        Ok((job, cancelled.len()))
    }

    async fn find_job(&self, id: DbId) -> PipelineResult<Option<BuildJob>> {
        Ok(self.state.lock().await.jobs.get(&id).cloned())
    }

    async fn job_tasks(&self, job_id: DbId) -> PipelineResult<Vec<BuildTask>> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| t.build_job_id == job_id)
            .cloned()
            .collect())
    }

    async fn list_jobs(&self, limit: i64) -> PipelineResult<Vec<BuildJob>> {
        let state = self.state.lock().await;
        let limit = clamp_limit(limit, build_job_repo::MAX_LIMIT);
        Ok(state.jobs.values().rev().take(limit).cloned().collect())
    }

    async fn pending_tasks(&self, limit: i64) -> PipelineResult<Vec<BuildTask>> {
        let state = self.state.lock().await;
        let limit = clamp_limit(limit, build_task_repo::MAX_LIMIT);
        let mut pending: Vec<BuildTask> = state
            .tasks
            .values()
            .filter(|t| t.status() == Some(BuildTaskStatus::Pending))
            .cloned()
            .collect();
        // Stable sort keeps ID (insertion) order within a priority.
        pending.sort_by(|a, b| b.priority.cmp(&a.priority));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn throughput_samples(&self, since: Timestamp) -> PipelineResult<(i64, Vec<FinishedTask>)> {
        let state = self.state.lock().await;
        let jobs_created = state.jobs.values().filter(|j| j.requested_at >= since).count() as i64;
        let finished = state
            .tasks
            .values()
            .filter_map(|t| {
                let completed_at = t.completed_at.filter(|at| *at >= since)?;
                match t.status()? {
                    BuildTaskStatus::Completed | BuildTaskStatus::Failed => Some(FinishedTask {
                        succeeded: t.status() == Some(BuildTaskStatus::Completed),
                        started_at: t.started_at,
                        completed_at,
                    }),
                    _ => None,
                }
            })
            .collect();
        Ok((jobs_created, finished))
    }
}
