//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chartops_core::types::DbId;

use crate::error::AppError;

/// Header carrying the acting user's id, set by the upstream gateway.
pub const ACTOR_HEADER: &str = "x-user-id";

/// The acting user, if the request names one.
///
/// Identity is established upstream; this only reads the forwarded id. A
/// malformed id is rejected rather than treated as anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Option<DbId>);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor(None));
        };
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<DbId>().ok())
            .map(|id| Actor(Some(id)))
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {ACTOR_HEADER} header")))
    }
}
