#![allow(dead_code)]

use std::sync::Arc;

use chartops_db::models::chart_definition::{ChartDefinition, DefinitionContent, SaveChartDefinition};
use chartops_pipeline::{
    BuildOrchestrator, MemoryAuditSink, MemoryStore, PipelineConfig, StaticDatasetCatalog,
    ValidationPipeline, VersionLedger,
};

pub const USER: Option<i64> = Some(42);
pub const DATASET: i64 = 1;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub ledger: VersionLedger,
    pub validation: ValidationPipeline,
    pub orchestrator: BuildOrchestrator,
}

pub fn harness() -> Harness {
    harness_with(StaticDatasetCatalog::new().with_dataset(DATASET, ["Sales", "Region", "Amount"]))
}

pub fn harness_with(catalog: StaticDatasetCatalog) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let config = PipelineConfig::default();
    Harness {
        ledger: VersionLedger::new(store.clone(), audit.clone()),
        validation: ValidationPipeline::new(
            store.clone(),
            Arc::new(catalog),
            audit.clone(),
            config.clone(),
        ),
        orchestrator: BuildOrchestrator::new(store.clone(), audit.clone(), config),
        store,
        audit,
    }
}

pub fn content(name: &str) -> DefinitionContent {
    DefinitionContent {
        name: name.to_string(),
        description: Some(format!("{name} chart")),
        dataset_id: DATASET,
        tags: vec!["finance".to_string()],
        filter_payload: Some(r#"[{"column": "Region", "operator": "equals", "value": "EU"}]"#.into()),
        visual_payload: Some(r#"{"chartType": "bar"}"#.into()),
        calculation_payload: Some(
            r#"[{"name": "Total", "formula": "SUM([Sales])", "type": "aggregate"}]"#.into(),
        ),
    }
}

pub async fn create(h: &Harness, content: DefinitionContent) -> ChartDefinition {
    h.ledger
        .save(SaveChartDefinition { id: None, content }, USER)
        .await
        .unwrap()
}

pub async fn edit(h: &Harness, id: i64, content: DefinitionContent) -> ChartDefinition {
    h.ledger
        .save(SaveChartDefinition { id: Some(id), content }, USER)
        .await
        .unwrap()
}

/// A definition with one snapshot row and auto-approval, ready to build.
pub async fn buildable(h: &Harness, name: &str) -> ChartDefinition {
    let definition = create(h, content(name)).await;
    let mut next = content(name);
    next.description = Some(format!("{name} chart, revised"));
    edit(h, definition.id, next).await;
    assert!(h.validation.auto_approve_if_valid(definition.id, USER).await.unwrap());
    h.ledger.get(definition.id).await.unwrap()
}
