//! Handlers for the `/formulas` resource: stateless formula checks and the
//! function catalog used by editors.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chartops_core::formula::{
    find_function, functions_for_chart_type, supported_functions, validate_formula, FunctionSpec,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateFormulaRequest {
    pub formula: String,
    pub chart_type: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionsParams {
    pub chart_type: Option<String>,
}

/// POST /api/v1/formulas/validate
///
/// Without `chart_type`, checks against the configured default chart type.
pub async fn validate(
    State(state): State<AppState>,
    Json(input): Json<ValidateFormulaRequest>,
) -> AppResult<impl IntoResponse> {
    let chart_type = input
        .chart_type
        .as_deref()
        .unwrap_or(&state.config.default_chart_type);
    let result = validate_formula(&input.formula, chart_type, &input.columns);
    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/formulas/functions?chart_type=pie
///
/// Without `chart_type`, the full allow-list.
pub async fn list_functions(Query(params): Query<FunctionsParams>) -> AppResult<impl IntoResponse> {
    let names = match params.chart_type.as_deref() {
        Some(chart_type) => functions_for_chart_type(chart_type),
        None => supported_functions(),
    };
    let functions: Vec<&FunctionSpec> = names.into_iter().filter_map(find_function).collect();
    Ok(Json(DataResponse { data: functions }))
}
