//! Validation pipeline: dataset, schema and formula checks, and
//! auto-approval of definitions that pass all three.

use std::sync::Arc;

use chartops_core::audit::{action_types, entity_types};
use chartops_core::error::CoreError;
use chartops_core::formula::validate_formula;
use chartops_core::payload::{self, check_calculation_payload, check_filter_payload};
use chartops_core::types::DbId;
use chartops_db::models::chart_definition::ChartDefinition;
use serde::Serialize;

use crate::collaborators::{record_audit, AuditEntry, AuditSink, CatalogError, DatasetCatalog};
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::store::LedgerStore;

/// Outcome of validating one chart definition.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub chart_definition_id: DbId,
    pub is_valid: bool,
    pub dataset_valid: bool,
    pub schema_valid: bool,
    pub formula_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Set only by [`ValidationPipeline::auto_approve`] when approval was
    /// granted.
    pub auto_approved: bool,
}

impl ValidationReport {
    fn not_found(id: DbId) -> Self {
        Self {
            chart_definition_id: id,
            errors: vec![CoreError::not_found("chart_definition", id).to_string()],
            ..Self::default()
        }
    }
}

pub struct ValidationPipeline {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn DatasetCatalog>,
    audit: Arc<dyn AuditSink>,
    config: PipelineConfig,
}

impl ValidationPipeline {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn DatasetCatalog>,
        audit: Arc<dyn AuditSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            audit,
            config,
        }
    }

    /// Run every check against the current head of a definition.
    ///
    /// A missing definition is reported, not raised: the report carries a
    /// single error and is invalid.
    pub async fn validate_definition(&self, id: DbId) -> PipelineResult<ValidationReport> {
        match self.store.find_definition(id).await? {
            Some(definition) => Ok(self.validate(&definition).await),
            None => Ok(ValidationReport::not_found(id)),
        }
    }

    /// Validate and, when valid, grant auto-approval to the head that was
    /// validated. An edit racing the approval leaves the definition
    /// unapproved and adds a warning to the report.
    pub async fn auto_approve(
        &self,
        id: DbId,
        user_id: Option<DbId>,
    ) -> PipelineResult<ValidationReport> {
        let definition = self
            .store
            .find_definition(id)
            .await?
            .ok_or(CoreError::not_found("chart_definition", id))?;
        let mut report = self.validate(&definition).await;
        if !report.is_valid {
            tracing::info!(
                chart_definition_id = id,
                errors = report.errors.len(),
                "Auto-approval refused"
            );
            return Ok(report);
        }

        let approved = self
            .store
            .approve_definition(id, definition.version_number, user_id)
            .await?;
        if approved.is_none() {
            report.warnings.push(format!(
                "Chart definition {id} changed after version {} was validated; not approved",
                definition.version_number
            ));
            return Ok(report);
        }

        report.auto_approved = true;
        tracing::info!(
            chart_definition_id = id,
            version_number = definition.version_number,
            "Chart definition auto-approved"
        );
        record_audit(
            self.audit.as_ref(),
            AuditEntry {
                actor_id: user_id,
                entity_type: entity_types::CHART_DEFINITION,
                entity_id: id,
                action: action_types::AUTO_APPROVE,
                detail: Some(serde_json::json!({
                    "version_number": definition.version_number,
                    "warnings": report.warnings,
                })),
            },
        )
        .await;

        Ok(report)
    }

    /// [`Self::auto_approve`], reduced to whether approval was granted.
    pub async fn auto_approve_if_valid(&self, id: DbId, user_id: Option<DbId>) -> PipelineResult<bool> {
        Ok(self.auto_approve(id, user_id).await?.auto_approved)
    }

    async fn validate(&self, definition: &ChartDefinition) -> ValidationReport {
        let mut report = ValidationReport {
            chart_definition_id: definition.id,
            ..ValidationReport::default()
        };

        let columns = self.check_dataset(definition, &mut report).await;
        report.schema_valid = check_schema(definition, &mut report.errors);
        report.formula_valid = self.check_formulas(definition, &columns, &mut report);

        report.is_valid = report.dataset_valid && report.schema_valid && report.formula_valid;
        tracing::debug!(
            chart_definition_id = definition.id,
            is_valid = report.is_valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Chart definition validated"
        );
        report
    }

    /// Returns the dataset's columns, empty when the check fails.
    async fn check_dataset(
        &self,
        definition: &ChartDefinition,
        report: &mut ValidationReport,
    ) -> Vec<String> {
        let dataset_id = definition.dataset_id;
        if dataset_id <= 0 {
            report
                .errors
                .push(format!("Dataset id must be positive, got {dataset_id}"));
            return Vec::new();
        }

        match self.dataset_columns(dataset_id).await {
            Ok(Some(columns)) => {
                report.dataset_valid = true;
                columns
            }
            Ok(None) => {
                report.errors.push(format!("Dataset {dataset_id} does not exist"));
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(dataset_id, error = %e, "Dataset catalog lookup failed");
                report.errors.push(e.to_string());
                Vec::new()
            }
        }
    }

    async fn dataset_columns(&self, dataset_id: DbId) -> Result<Option<Vec<String>>, CatalogError> {
        if !self.catalog.exists(dataset_id).await? {
            return Ok(None);
        }
        self.catalog.columns(dataset_id).await.map(Some)
    }

    fn check_formulas(
        &self,
        definition: &ChartDefinition,
        columns: &[String],
        report: &mut ValidationReport,
    ) -> bool {
        let Some(raw) = definition.calculation_payload.as_deref() else {
            return true;
        };
        if payload::is_blank(Some(raw)) {
            return true;
        }

        let chart_type = payload::chart_type_of(definition.visual_payload.as_deref())
            .unwrap_or_else(|| self.config.default_chart_type.clone());

        // Entries the schema check rejected are already reported there.
        let mut valid = true;
        for entry in check_calculation_payload(raw).entries {
            let result = validate_formula(&entry.formula, &chart_type, columns);
            let prefix = format!("Calculation '{}': ", entry.name.trim());
            valid &= result.is_valid;
            report
                .errors
                .extend(result.errors.into_iter().map(|e| format!("{prefix}{e}")));
            report
                .warnings
                .extend(result.warnings.into_iter().map(|w| format!("{prefix}{w}")));
        }
        valid
    }
}

fn check_schema(definition: &ChartDefinition, errors: &mut Vec<String>) -> bool {
    let mut valid = true;
    if let Some(raw) = definition.filter_payload.as_deref().filter(|s| !s.trim().is_empty()) {
        let check = check_filter_payload(raw);
        valid &= check.is_valid();
        errors.extend(check.errors);
    }
    if let Some(raw) = definition
        .calculation_payload
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        let check = check_calculation_payload(raw);
        valid &= check.is_valid();
        errors.extend(check.errors);
    }
    valid
}
