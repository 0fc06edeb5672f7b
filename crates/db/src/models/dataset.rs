//! Dataset catalog rows consulted by validation.

use chartops_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `datasets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Dataset {
    pub id: DbId,
    pub name: String,
    pub column_names: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
