//! Immutable chart definition snapshots.

use chartops_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

use super::chart_definition::DefinitionContent;

/// A row from the `chart_versions` table. Never updated after insert.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ChartVersion {
    pub id: DbId,
    pub chart_definition_id: DbId,
    pub version_number: i32,
    pub snapshot: Json<DefinitionContent>,
    pub approved: bool,
    pub approved_by: Option<DbId>,
    pub approved_at: Option<Timestamp>,
    pub diff_summary: Option<String>,
    /// Set on the post-rollback row: the version the content came from.
    pub rollback_source_version_number: Option<i32>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
}

/// Insert DTO for a snapshot row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChartVersion {
    pub chart_definition_id: DbId,
    pub version_number: i32,
    pub snapshot: DefinitionContent,
    pub approved: bool,
    pub approved_by: Option<DbId>,
    pub approved_at: Option<Timestamp>,
    pub diff_summary: Option<String>,
    pub rollback_source_version_number: Option<i32>,
    pub created_by: Option<DbId>,
}
