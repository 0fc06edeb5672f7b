//! Chart definition head rows and the editable content they carry.

use chartops_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `chart_definitions` table: the mutable head.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ChartDefinition {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub dataset_id: DbId,
    pub tags: Vec<String>,
    pub filter_payload: Option<String>,
    pub visual_payload: Option<String>,
    pub calculation_payload: Option<String>,
    pub version_number: i32,
    pub auto_approved: bool,
    pub approved_by: Option<DbId>,
    pub approved_at: Option<Timestamp>,
    pub archived: bool,
    pub created_by: Option<DbId>,
    pub modified_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Every field a save edits and a rollback restores.
///
/// This is also the shape serialized into `chart_versions.snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionContent {
    pub name: String,
    pub description: Option<String>,
    pub dataset_id: DbId,
    #[serde(default)]
    pub tags: Vec<String>,
    pub filter_payload: Option<String>,
    pub visual_payload: Option<String>,
    pub calculation_payload: Option<String>,
}

impl ChartDefinition {
    /// Copy of the editable content of this head.
    pub fn content(&self) -> DefinitionContent {
        DefinitionContent {
            name: self.name.clone(),
            description: self.description.clone(),
            dataset_id: self.dataset_id,
            tags: self.tags.clone(),
            filter_payload: self.filter_payload.clone(),
            visual_payload: self.visual_payload.clone(),
            calculation_payload: self.calculation_payload.clone(),
        }
    }

    /// Overwrite the editable content of this head.
    pub fn set_content(&mut self, content: DefinitionContent) {
        self.name = content.name;
        self.description = content.description;
        self.dataset_id = content.dataset_id;
        self.tags = content.tags;
        self.filter_payload = content.filter_payload;
        self.visual_payload = content.visual_payload;
        self.calculation_payload = content.calculation_payload;
    }
}

/// DTO for `save`: no `id` inserts at version 1, an `id` updates that head.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveChartDefinition {
    pub id: Option<DbId>,
    #[serde(flatten)]
    pub content: DefinitionContent,
}
