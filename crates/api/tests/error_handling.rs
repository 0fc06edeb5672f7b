//! Tests for `AppError` -> HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no router is
//! involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;

use chartops_api::error::AppError;
use chartops_core::error::CoreError;
use chartops_pipeline::PipelineError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::from(CoreError::not_found("chart_definition", 42));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "chart_definition with id 42 not found");
}

#[tokio::test]
async fn invalid_operation_returns_409() {
    let err = AppError::from(CoreError::InvalidOperation("job already completed".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_OPERATION");
    assert_eq!(json["error"], "job already completed");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::from(CoreError::Validation("name must not be empty".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn bad_request_returns_400() {
    let (status, json) = error_to_response(AppError::BadRequest("bad status".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "bad status");
}

#[tokio::test]
async fn storage_failure_hides_details() {
    let err = AppError::from(PipelineError::Storage("connection refused on 10.0.0.3".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "UNAVAILABLE");
    assert!(!json["error"].as_str().unwrap().contains("10.0.0.3"));
}

#[tokio::test]
async fn internal_error_returns_503() {
    let (status, json) = error_to_response(AppError::from(CoreError::Internal("boom".into()))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "UNAVAILABLE");
}
