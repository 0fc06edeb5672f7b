//! Handlers for the `/charts` resource: definitions, their version ledger,
//! validation and auto-approval.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chartops_core::types::DbId;
use chartops_db::models::chart_definition::{DefinitionContent, SaveChartDefinition};
use serde::Deserialize;

use crate::error::AppResult;
use crate::extract::Actor;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListChartsParams {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub target_version: i32,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub from: i32,
    pub to: i32,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub archived: bool,
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// POST /api/v1/charts
///
/// Create a definition at version 1. Returns 201.
pub async fn create_chart(
    Actor(user_id): Actor,
    State(state): State<AppState>,
    Json(content): Json<DefinitionContent>,
) -> AppResult<impl IntoResponse> {
    let definition = state
        .ledger
        .save(SaveChartDefinition { id: None, content }, user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: definition })))
}

/// PUT /api/v1/charts/{id}
///
/// Snapshot the current head and apply the edit as the next version.
pub async fn update_chart(
    Actor(user_id): Actor,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(content): Json<DefinitionContent>,
) -> AppResult<impl IntoResponse> {
    let definition = state
        .ledger
        .save(SaveChartDefinition { id: Some(id), content }, user_id)
        .await?;
    Ok(Json(DataResponse { data: definition }))
}

/// GET /api/v1/charts
pub async fn list_charts(
    State(state): State<AppState>,
    Query(params): Query<ListChartsParams>,
) -> AppResult<impl IntoResponse> {
    let definitions = state.ledger.list(params.include_archived).await?;
    Ok(Json(DataResponse { data: definitions }))
}

/// GET /api/v1/charts/{id}
pub async fn get_chart(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let definition = state.ledger.get(id).await?;
    Ok(Json(DataResponse { data: definition }))
}

/// PUT /api/v1/charts/{id}/archive
pub async fn set_archived(
    Actor(user_id): Actor,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ArchiveRequest>,
) -> AppResult<impl IntoResponse> {
    let definition = state.ledger.set_archived(id, input.archived, user_id).await?;
    Ok(Json(DataResponse { data: definition }))
}

// ---------------------------------------------------------------------------
// Version ledger
// ---------------------------------------------------------------------------

/// GET /api/v1/charts/{id}/versions
///
/// Snapshots, highest version first.
pub async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let versions = state.ledger.history(id).await?;
    Ok(Json(DataResponse { data: versions }))
}

/// GET /api/v1/charts/{id}/versions/{version}
pub async fn get_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(DbId, i32)>,
) -> AppResult<impl IntoResponse> {
    let version = state.ledger.get_version(id, version).await?;
    Ok(Json(DataResponse { data: version }))
}

/// POST /api/v1/charts/{id}/rollback
pub async fn rollback(
    Actor(user_id): Actor,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<RollbackRequest>,
) -> AppResult<impl IntoResponse> {
    let definition = state
        .ledger
        .rollback(id, input.target_version, user_id)
        .await?;
    Ok(Json(DataResponse { data: definition }))
}

/// GET /api/v1/charts/{id}/compare?from=1&to=2
pub async fn compare_versions(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<CompareParams>,
) -> AppResult<impl IntoResponse> {
    let comparison = state
        .ledger
        .compare_versions(id, params.from, params.to)
        .await?;
    Ok(Json(DataResponse { data: comparison }))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// POST /api/v1/charts/{id}/validate
///
/// Always 200: an invalid definition is a report, not an error.
pub async fn validate_chart(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state.validation.validate_definition(id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/charts/{id}/auto-approve
///
/// Returns the validation report; `auto_approved` tells whether approval
/// was granted.
pub async fn auto_approve(
    Actor(user_id): Actor,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state.validation.auto_approve(id, user_id).await?;
    Ok(Json(DataResponse { data: report }))
}
