//! Build task rows: one (definition, version) pair to render.

use chartops_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{BuildTaskStatus, StatusId};

/// A row from the `build_tasks` table. The target version never changes
/// after insert; a retry re-runs the same version.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct BuildTask {
    pub id: DbId,
    pub build_job_id: DbId,
    pub chart_definition_id: DbId,
    pub chart_version_id: DbId,
    pub version_number: i32,
    pub priority: i32,
    pub status_id: StatusId,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error_payload: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BuildTask {
    pub fn status(&self) -> Option<BuildTaskStatus> {
        BuildTaskStatus::from_id(self.status_id)
    }
}

/// Insert DTO for a task created alongside its job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBuildTask {
    pub chart_definition_id: DbId,
    pub chart_version_id: DbId,
    pub version_number: i32,
    pub priority: i32,
}
