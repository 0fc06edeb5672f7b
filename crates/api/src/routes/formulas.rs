use axum::routing::{get, post};
use axum::Router;

use crate::handlers::formulas;
use crate::state::AppState;

/// Routes mounted at `/formulas`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/validate", post(formulas::validate))
        .route("/functions", get(formulas::list_functions))
}
