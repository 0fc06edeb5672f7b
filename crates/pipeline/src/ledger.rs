//! Version ledger: save, history, diff, rollback and archival of chart
//! definitions.

use std::sync::Arc;

use chartops_core::audit::{action_types, entity_types};
use chartops_core::diff::{changed_fields, FieldDiff};
use chartops_core::error::CoreError;
use chartops_core::types::DbId;
use chartops_db::models::chart_definition::{ChartDefinition, DefinitionContent, SaveChartDefinition};
use chartops_db::models::chart_version::ChartVersion;
use serde::Serialize;

use crate::collaborators::{record_audit, AuditEntry, AuditSink};
use crate::error::PipelineResult;
use crate::revision::diff_content;
use crate::store::LedgerStore;

/// Field-level comparison of two versions of one definition.
#[derive(Debug, Clone, Serialize)]
pub struct VersionComparison {
    pub chart_definition_id: DbId,
    pub from_version: i32,
    pub to_version: i32,
    pub fields: Vec<FieldDiff>,
    pub changed_fields: Vec<&'static str>,
}

impl VersionComparison {
    pub fn has_changes(&self) -> bool {
        !self.changed_fields.is_empty()
    }
}

pub struct VersionLedger {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

impl VersionLedger {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Insert a new definition at version 1, or snapshot the current head of
    /// an existing one and apply the edit as the next version.
    pub async fn save(
        &self,
        input: SaveChartDefinition,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        check_content(&input.content)?;

        let definition = match input.id {
            None => {
                let definition = self.store.insert_definition(&input.content, user_id).await?;
                tracing::info!(chart_definition_id = definition.id, "Chart definition created");
                definition
            }
            Some(id) => {
                let definition = self.store.save_definition(id, input.content, user_id).await?;
                tracing::info!(
                    chart_definition_id = id,
                    version_number = definition.version_number,
                    "Chart definition saved"
                );
                definition
            }
        };
        Ok(definition)
    }

    pub async fn get(&self, id: DbId) -> PipelineResult<ChartDefinition> {
        Ok(self
            .store
            .find_definition(id)
            .await?
            .ok_or(CoreError::not_found("chart_definition", id))?)
    }

    pub async fn list(&self, include_archived: bool) -> PipelineResult<Vec<ChartDefinition>> {
        self.store.list_definitions(include_archived).await
    }

    /// Snapshots of a definition, highest version first.
    pub async fn history(&self, id: DbId) -> PipelineResult<Vec<ChartVersion>> {
        self.get(id).await?;
        self.store.list_versions(id).await
    }

    pub async fn get_version(&self, id: DbId, version_number: i32) -> PipelineResult<ChartVersion> {
        Ok(self
            .store
            .find_version(id, version_number)
            .await?
            .ok_or(CoreError::not_found("chart_version", DbId::from(version_number)))?)
    }

    /// Restore the content of `target_version`, recorded as new versions.
    /// The restored head is never approved.
    pub async fn rollback(
        &self,
        id: DbId,
        target_version: i32,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        let definition = self.store.rollback_definition(id, target_version, user_id).await?;
        tracing::info!(
            chart_definition_id = id,
            target_version,
            version_number = definition.version_number,
            "Chart definition rolled back"
        );

        record_audit(
            self.audit.as_ref(),
            AuditEntry {
                actor_id: user_id,
                entity_type: entity_types::CHART_DEFINITION,
                entity_id: id,
                action: action_types::ROLLBACK,
                detail: Some(serde_json::json!({
                    "target_version": target_version,
                    "version_number": definition.version_number,
                })),
            },
        )
        .await;

        Ok(definition)
    }

    /// Presence diff between two versions. A version number equal to the
    /// head's own number compares against the live head.
    pub async fn compare_versions(
        &self,
        id: DbId,
        from_version: i32,
        to_version: i32,
    ) -> PipelineResult<VersionComparison> {
        let head = self.get(id).await?;
        let from = self.content_at(&head, from_version).await?;
        let to = self.content_at(&head, to_version).await?;

        let fields = diff_content(&from, &to);
        Ok(VersionComparison {
            chart_definition_id: id,
            from_version,
            to_version,
            changed_fields: changed_fields(&fields),
            fields,
        })
    }

    /// Toggle archival. Archival is not content and takes no snapshot.
    pub async fn set_archived(
        &self,
        id: DbId,
        archived: bool,
        user_id: Option<DbId>,
    ) -> PipelineResult<ChartDefinition> {
        let definition = self
            .store
            .set_archived(id, archived, user_id)
            .await?
            .ok_or(CoreError::not_found("chart_definition", id))?;
        tracing::info!(chart_definition_id = id, archived, "Chart definition archival changed");
        Ok(definition)
    }

    async fn content_at(
        &self,
        head: &ChartDefinition,
        version_number: i32,
    ) -> PipelineResult<DefinitionContent> {
        if version_number == head.version_number {
            return Ok(head.content());
        }
        Ok(self.get_version(head.id, version_number).await?.snapshot.0)
    }
}

fn check_content(content: &DefinitionContent) -> Result<(), CoreError> {
    if content.name.trim().is_empty() {
        return Err(CoreError::Validation("Chart definition name must not be empty".into()));
    }
    Ok(())
}
