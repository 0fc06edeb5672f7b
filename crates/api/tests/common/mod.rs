use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use chartops_api::extract::ACTOR_HEADER;
use chartops_api::router::build_app_router;
use chartops_api::state::AppState;
use chartops_pipeline::{PipelineConfig, StaticDatasetCatalog};

/// Dataset every test chart points at.
pub const DATASET: i64 = 7;

/// Build the full application router on the in-memory store.
///
/// Uses the same middleware stack as the binary, with a catalog holding
/// [`DATASET`] and the columns `Sales` and `Region`.
pub fn build_test_app() -> Router {
    build_test_app_with(PipelineConfig::default())
}

/// Like [`build_test_app`], with explicit control-plane tunables.
pub fn build_test_app_with(config: PipelineConfig) -> Router {
    let catalog = StaticDatasetCatalog::new().with_dataset(DATASET, ["Sales", "Region"]);
    let state = AppState::in_memory(Arc::new(catalog), config);
    build_app_router(state, Duration::from_secs(30))
}

/// Send a request with an optional JSON body and acting user.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    actor: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body), Some("1")).await
}

pub async fn put_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body), Some("1")).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Chart content on [`DATASET`] with one clean calculation.
pub fn chart_body(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "dataset_id": DATASET,
        "tags": ["finance"],
        "visual_payload": "{\"chartType\": \"bar\"}",
        "calculation_payload": "[{\"name\": \"Total\", \"formula\": \"SUM([Sales])\", \"type\": \"aggregate\"}]"
    })
}
