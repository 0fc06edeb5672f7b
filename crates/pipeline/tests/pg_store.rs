//! `PgStore` under concurrent writers. Require `DATABASE_URL`; run with
//! `cargo test -p chartops-pipeline -- --ignored`.

mod common;

use std::sync::Arc;

use chartops_db::models::chart_definition::SaveChartDefinition;
use chartops_db::models::status::{BuildJobStatus, BuildTaskStatus, BuildTriggerType};
use chartops_pipeline::{BuildOrchestrator, PgAuditSink, PgStore, PipelineConfig, VersionLedger};
use common::{content, USER};
use sqlx::PgPool;

struct PgHarness {
    ledger: VersionLedger,
    orchestrator: BuildOrchestrator,
}

fn pg_harness(pool: PgPool) -> Arc<PgHarness> {
    let store = Arc::new(PgStore::new(pool.clone()));
    let audit = Arc::new(PgAuditSink::new(pool));
    Arc::new(PgHarness {
        ledger: VersionLedger::new(store.clone(), audit.clone()),
        orchestrator: BuildOrchestrator::new(store, audit, PipelineConfig::default()),
    })
}

/// Create a definition and edit it once so it has a snapshot to build.
async fn snapshotted(h: &PgHarness, name: &str) -> i64 {
    let created = h
        .ledger
        .save(SaveChartDefinition { id: None, content: content(name) }, USER)
        .await
        .unwrap();
    h.ledger
        .save(
            SaveChartDefinition {
                id: Some(created.id),
                content: content(&format!("{name} v2")),
            },
            USER,
        )
        .await
        .unwrap();
    created.id
}

// ---------------------------------------------------------------------------
// Build transitions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn concurrent_reports_close_the_job_exactly_once(pool: PgPool) {
    let h = pg_harness(pool);
    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(snapshotted(&h, &format!("chart {i}")).await);
    }
    let detail = h
        .orchestrator
        .create_selective_build_job(BuildTriggerType::Webhook, USER, &ids)
        .await
        .unwrap();
    assert_eq!(detail.tasks.len(), 12);

    // Two independent deliveries of every report race each other.
    let mut handles = Vec::new();
    for (i, task) in detail.tasks.iter().enumerate() {
        let status = if i % 3 == 0 {
            BuildTaskStatus::Failed
        } else {
            BuildTaskStatus::Completed
        };
        for _ in 0..2 {
            let h = Arc::clone(&h);
            let task_id = task.id;
            handles.push(tokio::spawn(async move {
                let update = h
                    .orchestrator
                    .update_task_status(task_id, status, None)
                    .await
                    .unwrap();
                update.transition.job_completed as usize
            }));
        }
    }

    let mut closed = 0;
    for handle in handles {
        closed += handle.await.unwrap();
    }
    assert_eq!(closed, 1);

    let detail = h.orchestrator.get_job(detail.job.id).await.unwrap();
    assert_eq!(detail.job.status(), Some(BuildJobStatus::Completed));
    let completed = detail
        .tasks
        .iter()
        .filter(|t| t.status() == Some(BuildTaskStatus::Completed))
        .count() as i32;
    let failed = detail
        .tasks
        .iter()
        .filter(|t| t.status() == Some(BuildTaskStatus::Failed))
        .count() as i32;
    assert_eq!((completed, failed), (8, 4));
    assert_eq!(detail.job.success_count, completed);
    assert_eq!(detail.job.failure_count, failed);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn cancel_racing_completions_leaves_consistent_counters(pool: PgPool) {
    let h = pg_harness(pool);
    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(snapshotted(&h, &format!("chart {i}")).await);
    }
    let detail = h
        .orchestrator
        .create_selective_build_job(BuildTriggerType::Manual, USER, &ids)
        .await
        .unwrap();
    let job_id = detail.job.id;

    let mut handles = Vec::new();
    for task in &detail.tasks {
        let h = Arc::clone(&h);
        let task_id = task.id;
        handles.push(tokio::spawn(async move {
            h.orchestrator
                .update_task_status(task_id, BuildTaskStatus::Completed, None)
                .await
                .is_ok()
        }));
    }
    let cancel = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.orchestrator.cancel_build_job(job_id, USER).await })
    };
    for handle in handles {
        assert!(handle.await.unwrap());
    }
    // Cancel loses the race only when every task already completed.
    let cancelled = cancel.await.unwrap().is_ok();

    let detail = h.orchestrator.get_job(job_id).await.unwrap();
    let completed = detail
        .tasks
        .iter()
        .filter(|t| t.status() == Some(BuildTaskStatus::Completed))
        .count() as i32;
    assert_eq!(detail.job.success_count, completed);
    assert_eq!(detail.job.failure_count, 0);
    if cancelled {
        assert_eq!(detail.job.status(), Some(BuildJobStatus::Cancelled));
    } else {
        assert_eq!(detail.job.status(), Some(BuildJobStatus::Completed));
        assert_eq!(completed, 6);
    }
}

// ---------------------------------------------------------------------------
// Version ledger
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn concurrent_saves_and_rollbacks_keep_versions_contiguous(pool: PgPool) {
    let h = pg_harness(pool);
    let id = snapshotted(&h, "Revenue").await;

    let saves = 8;
    let rollbacks = 4;
    let mut handles = Vec::new();
    for i in 0..saves {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.ledger
                .save(
                    SaveChartDefinition {
                        id: Some(id),
                        content: content(&format!("Revenue edit {i}")),
                    },
                    USER,
                )
                .await
                .unwrap();
        }));
    }
    for _ in 0..rollbacks {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.ledger.rollback(id, 1, USER).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Created at 1, edited to 2, then one bump per save and two per rollback.
    let head = h.ledger.get(id).await.unwrap();
    assert_eq!(head.version_number, 2 + saves + 2 * rollbacks);

    let mut numbers: Vec<i32> = h
        .ledger
        .history(id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    numbers.reverse();
    let expected: Vec<i32> = (1..head.version_number).collect();
    assert_eq!(numbers, expected);
}
