//! Field-level diff markers for comparing chart definition versions.
//!
//! Comparisons are presence/absence only: a field either matches exactly
//! between the two sides or it is reported as changed. Payload internals are
//! never diffed structurally.

use serde::{Deserialize, Serialize};

/// The status of one field in a version comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Changed,
    Unchanged,
}

impl DiffStatus {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
        }
    }

    /// Compare two values of the same field.
    pub fn of<T: PartialEq + ?Sized>(from: &T, to: &T) -> Self {
        if from == to {
            Self::Unchanged
        } else {
            Self::Changed
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named field and its diff status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: &'static str,
    pub status: DiffStatus,
}

impl FieldDiff {
    pub fn new<T: PartialEq + ?Sized>(field: &'static str, from: &T, to: &T) -> Self {
        Self {
            field,
            status: DiffStatus::of(from, to),
        }
    }
}

/// Names of the fields reported as changed, in input order.
pub fn changed_fields(diffs: &[FieldDiff]) -> Vec<&'static str> {
    diffs
        .iter()
        .filter(|d| d.status == DiffStatus::Changed)
        .map(|d| d.field)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_returns_correct_strings() {
        assert_eq!(DiffStatus::Changed.as_str(), "changed");
        assert_eq!(DiffStatus::Unchanged.as_str(), "unchanged");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(format!("{}", DiffStatus::Changed), "changed");
    }

    #[test]
    fn optional_fields_compare_presence() {
        let none: Option<String> = None;
        let some = Some("x".to_string());
        assert_eq!(DiffStatus::of(&none, &some), DiffStatus::Changed);
        assert_eq!(DiffStatus::of(&none, &None), DiffStatus::Unchanged);
    }

    #[test]
    fn changed_fields_filters_unchanged() {
        let diffs = vec![
            FieldDiff::new("name", "a", "b"),
            FieldDiff::new("description", "same", "same"),
        ];
        assert_eq!(changed_fields(&diffs), vec!["name"]);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&DiffStatus::Unchanged).unwrap();
        assert_eq!(json, "\"unchanged\"");
    }
}
