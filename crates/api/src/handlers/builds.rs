//! Handlers for the `/builds` and `/tasks` resources.
//!
//! `/tasks` is the surface of the external build worker: it polls pending
//! tasks and reports their progress back.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chartops_core::types::DbId;
use chartops_db::models::build_job::BuildJob;
use chartops_db::models::build_task::BuildTask;
use chartops_db::models::status::{BuildTaskStatus, BuildTriggerType};
use chartops_pipeline::transitions::TaskOutcome;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default page size for job and task listings.
const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CreateBuildRequest {
    /// `manual` (default), `scheduled` or `webhook`.
    pub trigger_type: Option<String>,
    /// Build exactly these definitions, approved or not.
    pub definition_ids: Option<Vec<DbId>>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub status: String,
    pub error_payload: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub retried: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task: BuildTask,
    pub job: BuildJob,
    /// False when the report repeated or arrived after a later state.
    pub applied: bool,
}

fn parse<T: FromStr<Err = String>>(raw: &str) -> AppResult<T> {
    T::from_str(raw).map_err(AppError::BadRequest)
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// POST /api/v1/builds
///
/// Create a build job. Returns 201 with the job and its tasks, 409 when
/// nothing is eligible.
pub async fn create_build(
    Actor(user_id): Actor,
    State(state): State<AppState>,
    Json(input): Json<CreateBuildRequest>,
) -> AppResult<impl IntoResponse> {
    let trigger = match input.trigger_type.as_deref() {
        Some(raw) => parse::<BuildTriggerType>(raw)?,
        None => BuildTriggerType::Manual,
    };
    let detail = match input.definition_ids {
        Some(ids) => {
            state
                .orchestrator
                .create_selective_build_job(trigger, user_id, &ids)
                .await?
        }
        None => state.orchestrator.create_build_job(trigger, user_id).await?,
    };
    Ok((StatusCode::CREATED, Json(DataResponse { data: detail })))
}

/// GET /api/v1/builds
pub async fn list_builds(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let jobs = state
        .orchestrator
        .list_jobs(params.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/builds/{id}
pub async fn get_build(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let detail = state.orchestrator.get_job(job_id).await?;
    Ok(Json(DataResponse { data: detail }))
}

/// POST /api/v1/builds/{id}/retry
///
/// Requeue failed tasks. Zero retried is a success.
pub async fn retry_build(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let retried = state.orchestrator.retry_failed_tasks(job_id).await?;
    Ok(Json(DataResponse {
        data: RetryResponse { retried },
    }))
}

/// POST /api/v1/builds/{id}/cancel
///
/// 409 if the job already completed or was cancelled.
pub async fn cancel_build(
    Actor(user_id): Actor,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.cancel_build_job(job_id, user_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/builds/stats
pub async fn throughput_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.orchestrator.get_throughput_stats().await?;
    Ok(Json(DataResponse { data: stats }))
}

// ---------------------------------------------------------------------------
// Tasks (build worker)
// ---------------------------------------------------------------------------

/// GET /api/v1/tasks/pending
pub async fn pending_tasks(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let tasks = state
        .orchestrator
        .pending_tasks(params.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(DataResponse { data: tasks }))
}

/// PUT /api/v1/tasks/{id}/status
///
/// Progress report from the build worker. Repeated deliveries return 200
/// with `applied: false`.
pub async fn update_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
    Json(input): Json<TaskStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let status = parse::<BuildTaskStatus>(&input.status)?;
    let update = state
        .orchestrator
        .update_task_status(task_id, status, input.error_payload)
        .await?;
    Ok(Json(DataResponse {
        data: TaskStatusResponse {
            applied: update.transition.outcome == TaskOutcome::Applied,
            task: update.task,
            job: update.job,
        },
    }))
}
