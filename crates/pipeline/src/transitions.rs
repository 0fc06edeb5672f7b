//! Pure job/task state machine.
//!
//! Task: `Pending -> Running -> {Completed | Failed}`, plus
//! `Pending/Running -> Cancelled`. Job: `Pending -> Running -> Completed`,
//! plus `Pending/Running -> Cancelled`. A job whose tasks all failed is still
//! `Completed`; `failure_count` carries the outcome.
//!
//! These functions mutate a job and its full task list in place. Callers
//! must hold the job's lock for the whole read-apply-write span so that
//! sibling re-scans and counter updates never interleave.

use chartops_core::error::CoreError;
use chartops_core::types::{DbId, Timestamp};
use chartops_db::models::build_job::BuildJob;
use chartops_db::models::build_task::{BuildTask, NewBuildTask};
use chartops_db::models::chart_definition::ChartDefinition;
use chartops_db::models::chart_version::ChartVersion;
use chartops_db::models::status::{BuildJobStatus, BuildTaskStatus};

/// What a task status update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// State changed and must be written back.
    Applied,
    /// Repeat delivery of the state the task is already in.
    Unchanged,
    /// Late delivery for a task that already moved past it (e.g. a start
    /// after cancellation). Nothing changes.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTransition {
    /// Position of the task in the slice passed in.
    pub task_index: usize,
    pub previous: BuildTaskStatus,
    pub outcome: TaskOutcome,
    /// The job moved `Pending -> Running` in this transition.
    pub job_started: bool,
    /// The job reached `Completed` in this transition.
    pub job_completed: bool,
}

fn task_status(task: &BuildTask) -> Result<BuildTaskStatus, CoreError> {
    task.status().ok_or_else(|| {
        CoreError::Internal(format!(
            "Build task {} has unknown status id {}",
            task.id, task.status_id
        ))
    })
}

fn job_status(job: &BuildJob) -> Result<BuildJobStatus, CoreError> {
    job.status().ok_or_else(|| {
        CoreError::Internal(format!(
            "Build job {} has unknown status id {}",
            job.id, job.status_id
        ))
    })
}

/// Choose one task per definition targeting its latest snapshot, in
/// definition order. Definitions without any snapshot are skipped.
pub fn plan_tasks(definitions: &[ChartDefinition], latest: &[ChartVersion]) -> Vec<NewBuildTask> {
    definitions
        .iter()
        .filter_map(|definition| {
            latest
                .iter()
                .filter(|v| v.chart_definition_id == definition.id)
                .max_by_key(|v| v.version_number)
                .map(|version| NewBuildTask {
                    chart_definition_id: definition.id,
                    chart_version_id: version.id,
                    version_number: version.version_number,
                    priority: 0,
                })
        })
        .collect()
}

/// Apply one status report for `task_id` to a job and its tasks.
pub fn apply_task_update(
    job: &mut BuildJob,
    tasks: &mut [BuildTask],
    task_id: DbId,
    target: BuildTaskStatus,
    error_payload: Option<serde_json::Value>,
    now: Timestamp,
) -> Result<TaskTransition, CoreError> {
    let task_index = tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or(CoreError::not_found("build_task", task_id))?;
    let previous = task_status(&tasks[task_index])?;

    let mut transition = TaskTransition {
        task_index,
        previous,
        outcome: TaskOutcome::Applied,
        job_started: false,
        job_completed: false,
    };

    use BuildTaskStatus::*;
    let outcome = match (previous, target) {
        (_, Pending) => {
            return Err(CoreError::InvalidOperation(format!(
                "Build task {task_id} cannot be moved back to pending; retry the job instead"
            )))
        }
        (Pending, Running) => {
            let task = &mut tasks[task_index];
            task.status_id = Running.id();
            task.started_at.get_or_insert(now);
            TaskOutcome::Applied
        }
        (Running, Running) => TaskOutcome::Unchanged,
        (_, Running) => TaskOutcome::Ignored,
        (Pending | Running, Completed | Failed | Cancelled) => {
            let task = &mut tasks[task_index];
            task.status_id = target.id();
            task.completed_at = Some(now);
            task.error_payload = if target == Failed { error_payload } else { None };
            TaskOutcome::Applied
        }
        (from, to) if from == to => TaskOutcome::Unchanged,
        (Cancelled, Completed | Failed) => TaskOutcome::Ignored,
        (from, to) => {
            return Err(CoreError::InvalidOperation(format!(
                "Build task {task_id} is already {from} and cannot become {to}"
            )))
        }
    };
    transition.outcome = outcome;

    if outcome != TaskOutcome::Applied {
        return Ok(transition);
    }

    tasks[task_index].updated_at = now;
    job.updated_at = now;

    if job_status(job)? == BuildJobStatus::Pending {
        job.status_id = BuildJobStatus::Running.id();
        job.started_at.get_or_insert(now);
        transition.job_started = true;
    }

    refresh_counters(job, tasks)?;

    if target.is_terminal() && !job_status(job)?.is_terminal() && all_settled(tasks)? {
        job.status_id = BuildJobStatus::Completed.id();
        job.completed_at = Some(now);
        job.summary = Some(summarize(tasks)?);
        transition.job_completed = true;
    }

    Ok(transition)
}

/// Reset every failed task to `Pending` and reopen the job.
///
/// Returns the indices of the reset tasks; an empty result means nothing
/// failed and nothing changed.
pub fn apply_retry(
    job: &mut BuildJob,
    tasks: &mut [BuildTask],
    now: Timestamp,
) -> Result<Vec<usize>, CoreError> {
    let mut reset = Vec::new();
    for (index, task) in tasks.iter_mut().enumerate() {
        if task_status(task)? == BuildTaskStatus::Failed {
            task.status_id = BuildTaskStatus::Pending.id();
            task.started_at = None;
            task.completed_at = None;
            task.error_payload = None;
            task.updated_at = now;
            reset.push(index);
        }
    }
    if reset.is_empty() {
        return Ok(reset);
    }

    job.status_id = BuildJobStatus::Running.id();
    job.completed_at = None;
    job.summary = None;
    job.updated_at = now;
    refresh_counters(job, tasks)?;
    Ok(reset)
}

/// Cancel a job that is still `Pending` or `Running`, cancelling every
/// unfinished task. Returns the indices of the cancelled tasks.
pub fn apply_cancel(
    job: &mut BuildJob,
    tasks: &mut [BuildTask],
    now: Timestamp,
) -> Result<Vec<usize>, CoreError> {
    let status = job_status(job)?;
    if status.is_terminal() {
        return Err(CoreError::InvalidOperation(format!(
            "Build job {} is already {status} and cannot be cancelled",
            job.id
        )));
    }

    let mut cancelled = Vec::new();
    for (index, task) in tasks.iter_mut().enumerate() {
        if !task_status(task)?.is_terminal() {
            task.status_id = BuildTaskStatus::Cancelled.id();
            task.completed_at = Some(now);
            task.updated_at = now;
            cancelled.push(index);
        }
    }

    job.status_id = BuildJobStatus::Cancelled.id();
    job.completed_at = Some(now);
    job.updated_at = now;
    refresh_counters(job, tasks)?;
    job.summary = Some(format!("Cancelled: {}", summarize(tasks)?));
    Ok(cancelled)
}

/// Recompute the cached counters from task states.
fn refresh_counters(job: &mut BuildJob, tasks: &[BuildTask]) -> Result<(), CoreError> {
    let mut succeeded = 0;
    let mut failed = 0;
    for task in tasks {
        match task_status(task)? {
            BuildTaskStatus::Completed => succeeded += 1,
            BuildTaskStatus::Failed => failed += 1,
            _ => {}
        }
    }
    job.success_count = succeeded;
    job.failure_count = failed;
    Ok(())
}

fn all_settled(tasks: &[BuildTask]) -> Result<bool, CoreError> {
    for task in tasks {
        if !task_status(task)?.is_terminal() {
            return Ok(false);
        }
    }
    Ok(true)
}

fn summarize(tasks: &[BuildTask]) -> Result<String, CoreError> {
    let (mut completed, mut failed, mut cancelled) = (0, 0, 0);
    for task in tasks {
        match task_status(task)? {
            BuildTaskStatus::Completed => completed += 1,
            BuildTaskStatus::Failed => failed += 1,
            BuildTaskStatus::Cancelled => cancelled += 1,
            _ => {}
        }
    }
    Ok(format!(
        "{} tasks: {completed} completed, {failed} failed, {cancelled} cancelled",
        tasks.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn job() -> BuildJob {
        let now = Utc::now();
        BuildJob {
            id: 1,
            trigger_type_id: 1,
            requested_by: Some(7),
            requested_at: now,
            status_id: BuildJobStatus::Pending.id(),
            started_at: None,
            completed_at: None,
            success_count: 0,
            failure_count: 0,
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn tasks(n: i64) -> Vec<BuildTask> {
        let now = Utc::now();
        (1..=n)
            .map(|id| BuildTask {
                id,
                build_job_id: 1,
                chart_definition_id: id,
                chart_version_id: 10 + id,
                version_number: 1,
                priority: 0,
                status_id: BuildTaskStatus::Pending.id(),
                started_at: None,
                completed_at: None,
                error_payload: None,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    fn update(
        job: &mut BuildJob,
        tasks: &mut [BuildTask],
        id: DbId,
        status: BuildTaskStatus,
    ) -> Result<TaskTransition, CoreError> {
        apply_task_update(job, tasks, id, status, None, Utc::now())
    }

    #[test]
    fn first_start_starts_the_job_once() {
        let (mut job, mut tasks) = (job(), tasks(2));
        let t = update(&mut job, &mut tasks, 1, BuildTaskStatus::Running).unwrap();
        assert!(t.job_started);
        assert_eq!(job.status(), Some(BuildJobStatus::Running));
        let started = tasks[0].started_at;
        assert!(started.is_some());

        let t = update(&mut job, &mut tasks, 2, BuildTaskStatus::Running).unwrap();
        assert!(!t.job_started);

        let t = update(&mut job, &mut tasks, 1, BuildTaskStatus::Running).unwrap();
        assert_eq!(t.outcome, TaskOutcome::Unchanged);
        assert_eq!(tasks[0].started_at, started);
    }

    #[test]
    fn repeated_completion_does_not_double_count() {
        let (mut job, mut tasks) = (job(), tasks(2));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Running).unwrap();
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        let t = update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        assert_eq!(t.outcome, TaskOutcome::Unchanged);
        assert_eq!(job.success_count, 1);
        assert_eq!(job.status(), Some(BuildJobStatus::Running));
    }

    #[test]
    fn last_terminal_task_completes_the_job() {
        let (mut job, mut tasks) = (job(), tasks(2));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        let t = update(&mut job, &mut tasks, 2, BuildTaskStatus::Failed).unwrap();
        assert!(t.job_completed);
        assert_eq!(job.status(), Some(BuildJobStatus::Completed));
        assert_eq!((job.success_count, job.failure_count), (1, 1));
        assert!(job.completed_at.is_some());
        assert_eq!(
            job.summary.as_deref(),
            Some("2 tasks: 1 completed, 1 failed, 0 cancelled")
        );
    }

    #[test]
    fn all_failed_job_is_still_completed() {
        let (mut job, mut tasks) = (job(), tasks(2));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Failed).unwrap();
        update(&mut job, &mut tasks, 2, BuildTaskStatus::Failed).unwrap();
        assert_eq!(job.status(), Some(BuildJobStatus::Completed));
        assert_eq!(job.failure_count, 2);
        assert_eq!(job.success_count, 0);
    }

    #[test]
    fn failure_keeps_error_payload() {
        let (mut job, mut tasks) = (job(), tasks(1));
        let payload = serde_json::json!({"message": "renderer crashed"});
        apply_task_update(
            &mut job,
            &mut tasks,
            1,
            BuildTaskStatus::Failed,
            Some(payload.clone()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(tasks[0].error_payload, Some(payload));
    }

    #[test]
    fn conflicting_terminal_status_is_rejected() {
        let (mut job, mut tasks) = (job(), tasks(2));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        assert_matches!(
            update(&mut job, &mut tasks, 1, BuildTaskStatus::Failed),
            Err(CoreError::InvalidOperation(_))
        );
        assert_matches!(
            update(&mut job, &mut tasks, 2, BuildTaskStatus::Pending),
            Err(CoreError::InvalidOperation(_))
        );
        assert_matches!(
            update(&mut job, &mut tasks, 99, BuildTaskStatus::Running),
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn late_reports_after_cancel_are_ignored() {
        let (mut job, mut tasks) = (job(), tasks(2));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Running).unwrap();
        apply_cancel(&mut job, &mut tasks, Utc::now()).unwrap();

        let t = update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        assert_eq!(t.outcome, TaskOutcome::Ignored);
        let t = update(&mut job, &mut tasks, 2, BuildTaskStatus::Running).unwrap();
        assert_eq!(t.outcome, TaskOutcome::Ignored);
        assert_eq!(job.success_count, 0);
        assert_eq!(job.status(), Some(BuildJobStatus::Cancelled));
    }

    #[test]
    fn cancel_is_illegal_once_terminal() {
        let (mut job, mut tasks) = (job(), tasks(1));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        assert_matches!(
            apply_cancel(&mut job, &mut tasks, Utc::now()),
            Err(CoreError::InvalidOperation(_))
        );
    }

    #[test]
    fn cancel_stamps_unfinished_tasks_only() {
        let (mut job, mut tasks) = (job(), tasks(3));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        update(&mut job, &mut tasks, 2, BuildTaskStatus::Running).unwrap();
        let cancelled = apply_cancel(&mut job, &mut tasks, Utc::now()).unwrap();
        assert_eq!(cancelled, vec![1, 2]);
        assert_eq!(tasks[0].status(), Some(BuildTaskStatus::Completed));
        assert!(tasks[1..].iter().all(|t| t.completed_at.is_some()));
        assert_eq!(job.success_count, 1);
    }

    #[test]
    fn retry_resets_failed_tasks_and_reopens_job() {
        let (mut job, mut tasks) = (job(), tasks(3));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        update(&mut job, &mut tasks, 2, BuildTaskStatus::Failed).unwrap();
        update(&mut job, &mut tasks, 3, BuildTaskStatus::Failed).unwrap();
        assert_eq!(job.status(), Some(BuildJobStatus::Completed));

        let reset = apply_retry(&mut job, &mut tasks, Utc::now()).unwrap();
        assert_eq!(reset, vec![1, 2]);
        assert_eq!(job.status(), Some(BuildJobStatus::Running));
        assert_eq!((job.success_count, job.failure_count), (1, 0));
        assert!(job.completed_at.is_none());
        for task in &tasks[1..] {
            assert_eq!(task.status(), Some(BuildTaskStatus::Pending));
            assert!(task.started_at.is_none() && task.completed_at.is_none());
            assert!(task.error_payload.is_none());
        }
        assert!(tasks[0].completed_at.is_some());
    }

    #[test]
    fn retry_without_failures_is_a_no_op() {
        let (mut job, mut tasks) = (job(), tasks(1));
        update(&mut job, &mut tasks, 1, BuildTaskStatus::Completed).unwrap();
        let before = job.clone();
        assert!(apply_retry(&mut job, &mut tasks, Utc::now()).unwrap().is_empty());
        assert_eq!(job, before);
    }
}
