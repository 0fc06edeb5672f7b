use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::charts;
use crate::state::AppState;

/// Routes mounted at `/charts`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(charts::list_charts).post(charts::create_chart))
        .route("/{id}", get(charts::get_chart).put(charts::update_chart))
        .route("/{id}/archive", put(charts::set_archived))
        .route("/{id}/versions", get(charts::list_versions))
        .route("/{id}/versions/{version}", get(charts::get_version))
        .route("/{id}/rollback", post(charts::rollback))
        .route("/{id}/compare", get(charts::compare_versions))
        .route("/{id}/validate", post(charts::validate_chart))
        .route("/{id}/auto-approve", post(charts::auto_approve))
}
