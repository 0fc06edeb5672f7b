//! Version ledger behaviour against the in-memory store.

mod common;

use assert_matches::assert_matches;
use chartops_core::audit::action_types;
use chartops_core::diff::DiffStatus;
use chartops_core::error::CoreError;
use chartops_db::models::chart_definition::SaveChartDefinition;
use chartops_pipeline::{ErrorKind, PipelineError};
use common::*;

async fn assert_contiguous_history(h: &Harness, id: i64) {
    let head = h.ledger.get(id).await.unwrap();
    let history = h.ledger.history(id).await.unwrap();
    assert_eq!(history.len() as i32, head.version_number - 1);
    let mut numbers: Vec<i32> = history.iter().map(|v| v.version_number).collect();
    numbers.reverse();
    assert_eq!(numbers, (1..head.version_number).collect::<Vec<_>>());
}

#[tokio::test]
async fn new_definition_starts_at_version_one_without_history() {
    let h = harness();
    let definition = create(&h, content("Revenue")).await;
    assert_eq!(definition.version_number, 1);
    assert!(h.ledger.history(definition.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn save_snapshots_previous_state() {
    let h = harness();
    let definition = create(&h, content("Revenue")).await;
    let saved = edit(&h, definition.id, content("Revenue by region")).await;

    assert_eq!(saved.version_number, 2);
    assert_eq!(saved.name, "Revenue by region");

    let history = h.ledger.history(definition.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version_number, 1);
    assert_eq!(history[0].snapshot.name, "Revenue");
    assert_eq!(history[0].diff_summary.as_deref(), Some("Version 1 snapshot"));
}

#[tokio::test]
async fn saving_revokes_auto_approval() {
    let h = harness();
    let definition = buildable(&h, "Revenue").await;
    assert!(definition.auto_approved);

    let saved = edit(&h, definition.id, content("Revenue")).await;
    assert!(!saved.auto_approved);
    let snapshot = h
        .ledger
        .get_version(definition.id, definition.version_number)
        .await
        .unwrap();
    assert!(snapshot.approved);
}

#[tokio::test]
async fn history_is_contiguous_after_saves_and_rollbacks() {
    let h = harness();
    let definition = create(&h, content("v1")).await;
    for name in ["v2", "v3", "v4"] {
        edit(&h, definition.id, content(name)).await;
    }
    h.ledger.rollback(definition.id, 2, USER).await.unwrap();
    edit(&h, definition.id, content("v5")).await;
    h.ledger.rollback(definition.id, 1, USER).await.unwrap();

    assert_contiguous_history(&h, definition.id).await;
}

#[tokio::test]
async fn rollback_restores_content_and_requires_reapproval() {
    let h = harness();
    let definition = create(&h, content("Original")).await;
    edit(&h, definition.id, content("Changed")).await;

    let rolled = h.ledger.rollback(definition.id, 1, USER).await.unwrap();
    assert_eq!(rolled.name, "Original");
    assert!(!rolled.auto_approved);
    assert_eq!(rolled.version_number, 4);

    let history = h.ledger.history(definition.id).await.unwrap();
    let restored = &history[0];
    assert_eq!(restored.version_number, 3);
    assert_eq!(restored.rollback_source_version_number, Some(1));
    assert!(!restored.approved);
    assert_eq!(restored.snapshot.name, "Original");
    assert_eq!(history[1].snapshot.name, "Changed");
}

#[tokio::test]
async fn rollback_twice_restores_same_content_under_new_versions() {
    let h = harness();
    let definition = create(&h, content("Original")).await;
    edit(&h, definition.id, content("Changed")).await;

    let first = h.ledger.rollback(definition.id, 1, USER).await.unwrap();
    let second = h.ledger.rollback(definition.id, 1, USER).await.unwrap();

    assert_eq!(first.content(), second.content());
    assert_ne!(first.version_number, second.version_number);

    let restored: Vec<_> = h
        .ledger
        .history(definition.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.rollback_source_version_number == Some(1))
        .collect();
    assert_eq!(restored.len(), 2);
    assert!(restored.iter().all(|v| !v.approved));
    assert_ne!(restored[0].version_number, restored[1].version_number);
}

#[tokio::test]
async fn rollback_is_audited() {
    let h = harness();
    let definition = create(&h, content("Original")).await;
    edit(&h, definition.id, content("Changed")).await;
    h.ledger.rollback(definition.id, 1, USER).await.unwrap();

    let entries = h.audit.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, action_types::ROLLBACK);
    assert_eq!(entries[0].entity_id, definition.id);
}

#[tokio::test]
async fn rollback_to_missing_version_is_not_found() {
    let h = harness();
    let definition = create(&h, content("Original")).await;
    let err = h.ledger.rollback(definition.id, 5, USER).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.ledger.get(definition.id).await.unwrap().version_number, 1);
}

#[tokio::test]
async fn compare_reports_changed_fields_only() {
    let h = harness();
    let definition = create(&h, content("Revenue")).await;
    let mut next = content("Revenue");
    next.calculation_payload =
        Some(r#"[{"name": "Avg", "formula": "AVG([Sales])", "type": "aggregate"}]"#.into());
    edit(&h, definition.id, next).await;

    let comparison = h.ledger.compare_versions(definition.id, 1, 2).await.unwrap();
    assert!(comparison.has_changes());
    assert_eq!(comparison.changed_fields, vec!["calculation_payload"]);
    let name = comparison.fields.iter().find(|f| f.field == "name").unwrap();
    assert_eq!(name.status, DiffStatus::Unchanged);
}

#[tokio::test]
async fn compare_requires_both_versions() {
    let h = harness();
    let definition = create(&h, content("Revenue")).await;
    assert_matches!(
        h.ledger.compare_versions(definition.id, 1, 3).await,
        Err(PipelineError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test]
async fn save_unknown_definition_is_not_found() {
    let h = harness();
    let err = h
        .ledger
        .save(SaveChartDefinition { id: Some(999), content: content("x") }, USER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn blank_name_is_a_validation_error() {
    let h = harness();
    let err = h
        .ledger
        .save(SaveChartDefinition { id: None, content: content("  ") }, USER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn archival_does_not_create_versions() {
    let h = harness();
    let definition = create(&h, content("Revenue")).await;
    let archived = h.ledger.set_archived(definition.id, true, USER).await.unwrap();
    assert!(archived.archived);
    assert_eq!(archived.version_number, 1);
    assert!(h.ledger.list(false).await.unwrap().is_empty());
    assert_eq!(h.ledger.list(true).await.unwrap().len(), 1);
}
