use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::builds;
use crate::state::AppState;

/// Routes mounted at `/builds`.
///
/// ```text
/// GET    /                -> list_builds
/// POST   /                -> create_build
/// GET    /stats           -> throughput_stats
/// GET    /{id}            -> get_build
/// POST   /{id}/retry      -> retry_build
/// POST   /{id}/cancel     -> cancel_build
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(builds::list_builds).post(builds::create_build))
        .route("/stats", get(builds::throughput_stats))
        .route("/{id}", get(builds::get_build))
        .route("/{id}/retry", post(builds::retry_build))
        .route("/{id}/cancel", post(builds::cancel_build))
}

/// Routes mounted at `/tasks`.
pub fn task_router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(builds::pending_tasks))
        .route("/{id}/status", put(builds::update_task_status))
}
