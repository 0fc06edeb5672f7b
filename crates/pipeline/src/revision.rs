//! Pure rules for revising a chart definition head.
//!
//! Every revision is two explicit phases: [`capture`] copies the head as it
//! is *now* into a snapshot row, then the edit is applied to a clone of the
//! head. Stores persist the resulting [`Revision`] atomically while holding
//! the head's lock.

use chartops_core::diff::FieldDiff;
use chartops_core::types::{DbId, Timestamp};
use chartops_db::models::chart_definition::{ChartDefinition, DefinitionContent};
use chartops_db::models::chart_version::{ChartVersion, NewChartVersion};

/// A planned change to one head: snapshot rows to append, then the new head.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub versions: Vec<NewChartVersion>,
    pub head: ChartDefinition,
}

/// Snapshot the head exactly as persisted, approval state included.
pub fn capture(head: &ChartDefinition, summary: String, user_id: Option<DbId>) -> NewChartVersion {
    NewChartVersion {
        chart_definition_id: head.id,
        version_number: head.version_number,
        snapshot: head.content(),
        approved: head.auto_approved,
        approved_by: head.approved_by,
        approved_at: head.approved_at,
        diff_summary: Some(summary),
        rollback_source_version_number: None,
        created_by: user_id,
    }
}

/// Next head after content changed: version bumped, approval revoked.
fn advance(head: &ChartDefinition, content: DefinitionContent, user_id: Option<DbId>, now: Timestamp) -> ChartDefinition {
    let mut next = head.clone();
    next.set_content(content);
    next.version_number += 1;
    next.auto_approved = false;
    next.approved_by = None;
    next.approved_at = None;
    next.modified_by = user_id;
    next.updated_at = now;
    next
}

/// Plan a save over an existing head.
pub fn plan_save(
    current: &ChartDefinition,
    content: DefinitionContent,
    user_id: Option<DbId>,
    now: Timestamp,
) -> Revision {
    let snapshot = capture(
        current,
        format!("Version {} snapshot", current.version_number),
        user_id,
    );
    Revision {
        versions: vec![snapshot],
        head: advance(current, content, user_id, now),
    }
}

/// Plan a rollback of `current` to the content of `target`.
///
/// Writes two rows: the pre-rollback head at N and the restored content at
/// N+1 (unapproved, pointing at the source version). The head lands at N+2
/// so every number below it stays backed by exactly one snapshot row.
pub fn plan_rollback(
    current: &ChartDefinition,
    target: &ChartVersion,
    user_id: Option<DbId>,
    now: Timestamp,
) -> Revision {
    let before = capture(
        current,
        format!(
            "Version {} snapshot before rollback to version {}",
            current.version_number, target.version_number
        ),
        user_id,
    );

    let mut head = advance(current, target.snapshot.0.clone(), user_id, now);
    let restored = NewChartVersion {
        chart_definition_id: head.id,
        version_number: head.version_number,
        snapshot: head.content(),
        approved: false,
        approved_by: None,
        approved_at: None,
        diff_summary: Some(format!("Rolled back to version {}", target.version_number)),
        rollback_source_version_number: Some(target.version_number),
        created_by: user_id,
    };
    head.version_number += 1;

    Revision {
        versions: vec![before, restored],
        head,
    }
}

/// Field-level presence diff between two content states.
pub fn diff_content(from: &DefinitionContent, to: &DefinitionContent) -> Vec<FieldDiff> {
    vec![
        FieldDiff::new("name", &from.name, &to.name),
        FieldDiff::new("description", &from.description, &to.description),
        FieldDiff::new("dataset_id", &from.dataset_id, &to.dataset_id),
        FieldDiff::new("tags", &from.tags, &to.tags),
        FieldDiff::new("filter_payload", &from.filter_payload, &to.filter_payload),
        FieldDiff::new("visual_payload", &from.visual_payload, &to.visual_payload),
        FieldDiff::new("calculation_payload", &from.calculation_payload, &to.calculation_payload),
    ]
}
