//! Build job rows: one render request fanned out into tasks.

use chartops_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{BuildJobStatus, BuildTriggerType, StatusId};

/// A row from the `build_jobs` table.
///
/// `success_count` and `failure_count` are caches of the number of child
/// tasks in `Completed` and `Failed` and are only written together with the
/// task change that moves them.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct BuildJob {
    pub id: DbId,
    pub trigger_type_id: StatusId,
    pub requested_by: Option<DbId>,
    pub requested_at: Timestamp,
    pub status_id: StatusId,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub success_count: i32,
    pub failure_count: i32,
    pub summary: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BuildJob {
    pub fn status(&self) -> Option<BuildJobStatus> {
        BuildJobStatus::from_id(self.status_id)
    }

    pub fn trigger_type(&self) -> Option<BuildTriggerType> {
        BuildTriggerType::from_id(self.trigger_type_id)
    }
}
