pub mod builds;
pub mod charts;
pub mod formulas;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /charts                                  list, create
/// /charts/{id}                             get, update
/// /charts/{id}/archive                     set archival (PUT)
/// /charts/{id}/versions                    version history
/// /charts/{id}/versions/{version}          one snapshot
/// /charts/{id}/rollback                    rollback (POST)
/// /charts/{id}/compare                     field diff (?from=&to=)
/// /charts/{id}/validate                    validation report (POST)
/// /charts/{id}/auto-approve                validate and approve (POST)
///
/// /formulas/validate                       check one formula (POST)
/// /formulas/functions                      allow-list (?chart_type=)
///
/// /builds                                  list, create
/// /builds/stats                            throughput statistics
/// /builds/{id}                             job with tasks
/// /builds/{id}/retry                       requeue failed tasks (POST)
/// /builds/{id}/cancel                      cancel (POST)
///
/// /tasks/pending                           claimable tasks
/// /tasks/{id}/status                       worker progress report (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/charts", charts::router())
        .nest("/formulas", formulas::router())
        .nest("/builds", builds::router())
        .nest("/tasks", builds::task_router())
}
