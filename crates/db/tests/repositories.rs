//! Repository round trips against a real database. Require `DATABASE_URL`;
//! run with `cargo test -p chartops-db -- --ignored`.

use chartops_db::models::build_task::NewBuildTask;
use chartops_db::models::chart_definition::DefinitionContent;
use chartops_db::models::chart_version::NewChartVersion;
use chartops_db::models::status::{BuildJobStatus, BuildTaskStatus, BuildTriggerType};
use chartops_db::repositories::{
    AuditLogRepo, BuildJobRepo, BuildTaskRepo, ChartDefinitionRepo, ChartVersionRepo, DatasetRepo,
};
use chartops_db::models::audit::CreateAuditLog;
use chrono::{Duration, Utc};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn content(name: &str) -> DefinitionContent {
    DefinitionContent {
        name: name.to_string(),
        description: Some("test chart".to_string()),
        dataset_id: 1,
        tags: vec!["ops".to_string()],
        filter_payload: None,
        visual_payload: Some(r#"{"chartType": "bar"}"#.to_string()),
        calculation_payload: None,
    }
}

fn snapshot(chart_definition_id: i64, version_number: i32, name: &str) -> NewChartVersion {
    NewChartVersion {
        chart_definition_id,
        version_number,
        snapshot: content(name),
        approved: false,
        approved_by: None,
        approved_at: None,
        diff_summary: Some(format!("Version {version_number} snapshot")),
        rollback_source_version_number: None,
        created_by: Some(1),
    }
}

// ---------------------------------------------------------------------------
// Chart definitions and versions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn definition_insert_and_head_update(pool: PgPool) {
    let created = ChartDefinitionRepo::insert(&pool, &content("Sales"), Some(1))
        .await
        .unwrap();
    assert_eq!(created.version_number, 1);
    assert!(!created.auto_approved);
    assert_eq!(created.content(), content("Sales"));

    let mut head = created.clone();
    head.set_content(content("Sales by region"));
    head.version_number = 2;
    let updated = ChartDefinitionRepo::update_head(&pool, &head).await.unwrap();
    assert_eq!(updated.name, "Sales by region");
    assert_eq!(updated.version_number, 2);

    let found = ChartDefinitionRepo::find_by_id(&pool, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Sales by region");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn approval_is_compare_and_swap_on_version(pool: PgPool) {
    let created = ChartDefinitionRepo::insert(&pool, &content("Sales"), None)
        .await
        .unwrap();

    let stale = ChartDefinitionRepo::approve_at_version(&pool, created.id, 2, Some(7))
        .await
        .unwrap();
    assert!(stale.is_none());

    let approved = ChartDefinitionRepo::approve_at_version(&pool, created.id, 1, Some(7))
        .await
        .unwrap()
        .unwrap();
    assert!(approved.auto_approved);
    assert_eq!(approved.approved_by, Some(7));
    assert!(approved.approved_at.is_some());

    let buildable = ChartDefinitionRepo::lock_approved(&pool).await.unwrap();
    assert_eq!(buildable.len(), 1);

    ChartDefinitionRepo::set_archived(&pool, created.id, true, None)
        .await
        .unwrap();
    assert!(ChartDefinitionRepo::lock_approved(&pool).await.unwrap().is_empty());
    assert!(ChartDefinitionRepo::list(&pool, false).await.unwrap().is_empty());
    assert_eq!(ChartDefinitionRepo::list(&pool, true).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn versions_are_unique_per_definition(pool: PgPool) {
    let definition = ChartDefinitionRepo::insert(&pool, &content("Sales"), None)
        .await
        .unwrap();
    ChartVersionRepo::insert(&pool, &snapshot(definition.id, 1, "Sales"))
        .await
        .unwrap();

    let duplicate = ChartVersionRepo::insert(&pool, &snapshot(definition.id, 1, "Other")).await;
    assert!(duplicate.is_err(), "duplicate version number must be rejected");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn versions_list_newest_first_and_resolve_latest(pool: PgPool) {
    let a = ChartDefinitionRepo::insert(&pool, &content("A"), None).await.unwrap();
    let b = ChartDefinitionRepo::insert(&pool, &content("B"), None).await.unwrap();
    let c = ChartDefinitionRepo::insert(&pool, &content("C"), None).await.unwrap();
    for n in 1..=3 {
        ChartVersionRepo::insert(&pool, &snapshot(a.id, n, &format!("A{n}")))
            .await
            .unwrap();
    }
    ChartVersionRepo::insert(&pool, &snapshot(b.id, 1, "B1")).await.unwrap();

    let history = ChartVersionRepo::list_by_definition(&pool, a.id).await.unwrap();
    let numbers: Vec<i32> = history.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![3, 2, 1]);
    assert_eq!(history[0].snapshot.0.name, "A3");

    let v2 = ChartVersionRepo::find_by_number(&pool, a.id, 2).await.unwrap().unwrap();
    assert_eq!(v2.diff_summary.as_deref(), Some("Version 2 snapshot"));

    let latest = ChartVersionRepo::latest_for_definitions(&pool, &[a.id, b.id, c.id])
        .await
        .unwrap();
    let latest: Vec<(i64, i32)> = latest
        .iter()
        .map(|v| (v.chart_definition_id, v.version_number))
        .collect();
    assert_eq!(latest, vec![(a.id, 3), (b.id, 1)]);
}

// ---------------------------------------------------------------------------
// Build jobs and tasks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn tasks_are_inserted_in_request_order(pool: PgPool) {
    let mut planned = Vec::new();
    for name in ["A", "B", "C"] {
        let definition = ChartDefinitionRepo::insert(&pool, &content(name), None)
            .await
            .unwrap();
        let version = ChartVersionRepo::insert(&pool, &snapshot(definition.id, 1, name))
            .await
            .unwrap();
        planned.push(NewBuildTask {
            chart_definition_id: definition.id,
            chart_version_id: version.id,
            version_number: 1,
            priority: 0,
        });
    }
    planned.reverse();

    let job = BuildJobRepo::insert(&pool, BuildTriggerType::Webhook, Some(3))
        .await
        .unwrap();
    assert_eq!(job.status(), Some(BuildJobStatus::Pending));
    assert_eq!(job.trigger_type(), Some(BuildTriggerType::Webhook));

    let tasks = BuildTaskRepo::insert_many(&pool, job.id, &planned).await.unwrap();
    let targets: Vec<i64> = tasks.iter().map(|t| t.chart_definition_id).collect();
    let expected: Vec<i64> = planned.iter().map(|t| t.chart_definition_id).collect();
    assert_eq!(targets, expected);
    assert!(tasks.iter().all(|t| t.status() == Some(BuildTaskStatus::Pending)));

    let listed = BuildTaskRepo::list_by_job(&pool, job.id).await.unwrap();
    assert_eq!(listed, tasks);
    assert_eq!(BuildTaskRepo::job_id_of(&pool, tasks[0].id).await.unwrap(), Some(job.id));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn task_state_round_trip_and_window_queries(pool: PgPool) {
    let definition = ChartDefinitionRepo::insert(&pool, &content("A"), None).await.unwrap();
    let version = ChartVersionRepo::insert(&pool, &snapshot(definition.id, 1, "A"))
        .await
        .unwrap();
    let new_task = NewBuildTask {
        chart_definition_id: definition.id,
        chart_version_id: version.id,
        version_number: 1,
        priority: 0,
    };
    let job = BuildJobRepo::insert(&pool, BuildTriggerType::Manual, None).await.unwrap();
    let tasks = BuildTaskRepo::insert_many(&pool, job.id, &[new_task.clone(), new_task])
        .await
        .unwrap();

    let now = Utc::now();
    let mut failed = tasks[0].clone();
    failed.status_id = BuildTaskStatus::Failed.id();
    failed.started_at = Some(now - Duration::seconds(30));
    failed.completed_at = Some(now);
    failed.error_payload = Some(serde_json::json!({"message": "renderer crashed"}));
    failed.updated_at = now;
    let saved = BuildTaskRepo::save_state(&pool, &failed).await.unwrap();
    assert_eq!(saved.status(), Some(BuildTaskStatus::Failed));
    assert_eq!(saved.error_payload, failed.error_payload);

    let pending = BuildTaskRepo::list_pending(&pool, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, tasks[1].id);

    let finished = BuildTaskRepo::finished_since(&pool, now - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].0, BuildTaskStatus::Failed.id());

    let mut running = job.clone();
    running.status_id = BuildJobStatus::Running.id();
    running.started_at = Some(now);
    running.failure_count = 1;
    running.updated_at = now;
    let saved_job = BuildJobRepo::save_state(&pool, &running).await.unwrap();
    assert_eq!(saved_job.status(), Some(BuildJobStatus::Running));
    assert_eq!(saved_job.failure_count, 1);

    assert_eq!(
        BuildJobRepo::count_requested_since(&pool, now - Duration::hours(1))
            .await
            .unwrap(),
        1
    );
    assert_eq!(BuildJobRepo::list_recent(&pool, 0).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Audit and datasets
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn audit_entries_are_appended(pool: PgPool) {
    let entry = CreateAuditLog {
        actor_id: Some(9),
        action_type: "rollback".to_string(),
        entity_type: "chart_definition".to_string(),
        entity_id: 5,
        details_json: Some(serde_json::json!({"target_version": 2})),
    };
    let log = AuditLogRepo::insert(&pool, &entry).await.unwrap();
    assert_eq!(log.actor_id, Some(9));
    assert_eq!(log.entity_id, 5);
    assert_eq!(log.details_json, entry.details_json);

    let stored: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE entity_type = 'chart_definition' AND entity_id = 5",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(stored, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn datasets_keep_their_columns(pool: PgPool) {
    let columns = vec!["Sales".to_string(), "Region".to_string()];
    let dataset = DatasetRepo::create(&pool, "orders", &columns).await.unwrap();
    let found = DatasetRepo::find_by_id(&pool, dataset.id).await.unwrap().unwrap();
    assert_eq!(found.column_names, columns);
    assert!(DatasetRepo::find_by_id(&pool, dataset.id + 1).await.unwrap().is_none());
}
