//! Build orchestrator: creates build jobs and owns every job and task state
//! transition reported by the external build worker.

use std::sync::Arc;

use chartops_core::audit::{action_types, entity_types};
use chartops_core::error::CoreError;
use chartops_core::throughput::{compute_throughput, window_start, ThroughputStats};
use chartops_core::types::DbId;
use chartops_db::models::build_job::BuildJob;
use chartops_db::models::build_task::BuildTask;
use chartops_db::models::status::{BuildTaskStatus, BuildTriggerType};
use chrono::Utc;
use serde::Serialize;

use crate::collaborators::{record_audit, AuditEntry, AuditSink};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::store::{BuildScope, BuildStore, TaskUpdate};
use crate::transitions::TaskOutcome;

/// A build job together with its tasks in insertion order.
#[derive(Debug, Clone, Serialize)]
pub struct BuildJobDetail {
    #[serde(flatten)]
    pub job: BuildJob,
    pub tasks: Vec<BuildTask>,
}

pub struct BuildOrchestrator {
    store: Arc<dyn BuildStore>,
    audit: Arc<dyn AuditSink>,
    config: PipelineConfig,
}

impl BuildOrchestrator {
    pub fn new(store: Arc<dyn BuildStore>, audit: Arc<dyn AuditSink>, config: PipelineConfig) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Job creation
    // -----------------------------------------------------------------------

    /// Build the latest version of every non-archived, auto-approved
    /// definition.
    pub async fn create_build_job(
        &self,
        trigger: BuildTriggerType,
        requested_by: Option<DbId>,
    ) -> PipelineResult<BuildJobDetail> {
        self.create(trigger, requested_by, BuildScope::Approved).await
    }

    /// Build the latest version of the given non-archived definitions,
    /// approved or not.
    pub async fn create_selective_build_job(
        &self,
        trigger: BuildTriggerType,
        requested_by: Option<DbId>,
        definition_ids: &[DbId],
    ) -> PipelineResult<BuildJobDetail> {
        if definition_ids.is_empty() {
            return Err(CoreError::InvalidOperation(
                "A selective build needs at least one chart definition".to_string(),
            )
            .into());
        }
        let mut ids = definition_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        self.create(trigger, requested_by, BuildScope::Selected(ids)).await
    }

    async fn create(
        &self,
        trigger: BuildTriggerType,
        requested_by: Option<DbId>,
        scope: BuildScope,
    ) -> PipelineResult<BuildJobDetail> {
        let (job, tasks) = self.store.create_job(trigger, requested_by, &scope).await?;
        tracing::info!(
            job_id = job.id,
            trigger = %trigger,
            task_count = tasks.len(),
            "Build job created"
        );
        Ok(BuildJobDetail { job, tasks })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Apply a status report from the build worker. Repeat and late
    /// deliveries are accepted and change nothing.
    pub async fn update_task_status(
        &self,
        task_id: DbId,
        status: BuildTaskStatus,
        error_payload: Option<serde_json::Value>,
    ) -> PipelineResult<TaskUpdate> {
        let update = self.store.update_task(task_id, status, error_payload).await?;
        let transition = &update.transition;

        match transition.outcome {
            TaskOutcome::Applied => tracing::info!(
                task_id,
                job_id = update.job.id,
                from = %transition.previous,
                to = %status,
                "Build task status changed"
            ),
            TaskOutcome::Unchanged | TaskOutcome::Ignored => tracing::debug!(
                task_id,
                current = %transition.previous,
                reported = %status,
                outcome = ?transition.outcome,
                "Build task status report had no effect"
            ),
        }
        if transition.job_started {
            tracing::info!(job_id = update.job.id, "Build job started");
        }
        if transition.job_completed {
            tracing::info!(
                job_id = update.job.id,
                success_count = update.job.success_count,
                failure_count = update.job.failure_count,
                "Build job completed"
            );
        }

        Ok(update)
    }

    /// Requeue every failed task of a job. Returns how many were requeued;
    /// zero is not an error.
    pub async fn retry_failed_tasks(&self, job_id: DbId) -> PipelineResult<usize> {
        let (job, count) = self.store.retry_failed(job_id).await?;
        if count > 0 {
            tracing::info!(job_id, retried = count, status = ?job.status(), "Failed build tasks requeued");
        } else {
            tracing::debug!(job_id, "No failed build tasks to retry");
        }
        Ok(count)
    }

    /// Cancel a pending or running job and every task that has not finished.
    pub async fn cancel_build_job(&self, job_id: DbId, user_id: Option<DbId>) -> PipelineResult<BuildJob> {
        let (job, cancelled) = self.store.cancel_job(job_id).await?;
        tracing::info!(job_id, cancelled_tasks = cancelled, "Build job cancelled");

        record_audit(
            self.audit.as_ref(),
            AuditEntry {
                actor_id: user_id,
                entity_type: entity_types::BUILD_JOB,
                entity_id: job_id,
                action: action_types::BUILD_CANCEL,
                detail: Some(serde_json::json!({ "cancelled_tasks": cancelled })),
            },
        )
        .await;

        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn get_job(&self, job_id: DbId) -> PipelineResult<BuildJobDetail> {
        let job = self
            .store
            .find_job(job_id)
            .await?
            .ok_or(CoreError::not_found("build_job", job_id))?;
        let tasks = self.store.job_tasks(job_id).await?;
        Ok(BuildJobDetail { job, tasks })
    }

    pub async fn list_jobs(&self, limit: i64) -> PipelineResult<Vec<BuildJob>> {
        self.store.list_jobs(limit).await
    }

    /// Tasks the build worker may claim, highest priority first.
    pub async fn pending_tasks(&self, limit: i64) -> PipelineResult<Vec<BuildTask>> {
        self.store.pending_tasks(limit).await
    }

    /// Throughput over the configured trailing window ending now.
    pub async fn get_throughput_stats(&self) -> PipelineResult<ThroughputStats> {
        let now = Utc::now();
        let hours = self.config.throughput_window_hours;
        let (jobs_created, finished) = self
            .store
            .throughput_samples(window_start(now, hours))
            .await?;
        Ok(compute_throughput(now, hours, jobs_created, &finished))
    }
}
