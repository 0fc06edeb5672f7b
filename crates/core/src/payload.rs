//! Structural contracts for chart definition payloads.
//!
//! Filter and calculation payloads are stored as opaque serialized text. They
//! are accepted either as a bare JSON array (contract version 1) or wrapped
//! in a versioned envelope:
//!
//! ```text
//! {"version": 1, "filters": [{"column": "Region", "operator": "equals", "value": "EU"}]}
//! {"version": 1, "calculations": [{"name": "Total", "formula": "SUM([Sales])", "type": "aggregate"}]}
//! ```
//!
//! Any other envelope version is rejected so stale validation never silently
//! accepts a newer shape. Violations are collected, never raised.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only payload contract version currently understood.
pub const PAYLOAD_CONTRACT_VERSION: u64 = 1;

/// Chart type assumed when the visual payload does not name one.
pub const DEFAULT_CHART_TYPE: &str = "bar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    Contains,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Between,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationKind {
    Aggregate,
    Calculated,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationEntry {
    pub name: String,
    pub formula: String,
    #[serde(rename = "type")]
    pub kind: CalculationKind,
}

/// Entries that conformed to the contract plus every violation found.
#[derive(Debug, Clone)]
pub struct PayloadCheck<T> {
    pub entries: Vec<T>,
    pub errors: Vec<String>,
}

impl<T> PayloadCheck<T> {
    fn failed(error: String) -> Self {
        Self {
            entries: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a filter payload against the filter contract.
pub fn check_filter_payload(raw: &str) -> PayloadCheck<FilterClause> {
    check_entries(raw, "Filter", "filters", |clause: &FilterClause, _| {
        let mut problems = Vec::new();
        if clause.column.trim().is_empty() {
            problems.push("column must not be empty".to_string());
        }
        match clause.operator {
            FilterOperator::Between
                if !matches!(&clause.value, Value::Array(items) if items.len() == 2) =>
            {
                problems.push("'between' requires a two-element array value".to_string());
            }
            FilterOperator::In if !clause.value.is_array() => {
                problems.push("'in' requires an array value".to_string());
            }
            _ => {}
        }
        problems
    })
}

/// Check a calculation payload against the calculation contract.
pub fn check_calculation_payload(raw: &str) -> PayloadCheck<CalculationEntry> {
    check_entries(raw, "Calculation", "calculations", |entry: &CalculationEntry, accepted| {
        let mut problems = Vec::new();
        let name = entry.name.trim();
        if name.is_empty() {
            problems.push("name must not be empty".to_string());
        } else if accepted
            .iter()
            .any(|e: &CalculationEntry| e.name.trim().eq_ignore_ascii_case(name))
        {
            problems.push(format!("duplicate name '{name}'"));
        }
        if entry.formula.trim().is_empty() {
            problems.push("formula must not be empty".to_string());
        }
        problems
    })
}

/// Read the chart type recorded in a visual payload, if any.
///
/// Accepts `chartType` or `chart_type` at the top level of a JSON object.
pub fn chart_type_of(visual_payload: Option<&str>) -> Option<String> {
    let value: Value = serde_json::from_str(visual_payload?).ok()?;
    value
        .get("chartType")
        .or_else(|| value.get("chart_type"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
}

/// A payload that is absent or only whitespace.
pub fn is_blank(payload: Option<&str>) -> bool {
    payload.map_or(true, |s| s.trim().is_empty())
}

/// Decode the entry list and run `rules` on each decoded entry. `rules`
/// receives the entries accepted so far; messages are prefixed with the
/// entry's 1-based position in the payload.
fn check_entries<T, F>(raw: &str, label: &str, key: &str, rules: F) -> PayloadCheck<T>
where
    T: DeserializeOwned,
    F: Fn(&T, &[T]) -> Vec<String>,
{
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return PayloadCheck::failed(format!("{label} payload is not valid JSON: {e}")),
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            match map.get("version").and_then(Value::as_u64) {
                Some(PAYLOAD_CONTRACT_VERSION) => {}
                Some(other) => {
                    return PayloadCheck::failed(format!(
                        "{label} payload version {other} is not supported"
                    ))
                }
                None => {
                    return PayloadCheck::failed(format!(
                        "{label} payload envelope requires a numeric 'version'"
                    ))
                }
            }
            match map.remove(key) {
                Some(Value::Array(items)) => items,
                _ => {
                    return PayloadCheck::failed(format!(
                        "{label} payload envelope requires a '{key}' array"
                    ))
                }
            }
        }
        _ => {
            return PayloadCheck::failed(format!(
                "{label} payload must be an array or a versioned envelope"
            ))
        }
    };

    let mut check = PayloadCheck {
        entries: Vec::with_capacity(items.len()),
        errors: Vec::new(),
    };
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(entry) => {
                let problems = rules(&entry, &check.entries);
                if problems.is_empty() {
                    check.entries.push(entry);
                } else {
                    check.errors.extend(
                        problems
                            .into_iter()
                            .map(|p| format!("{label} #{}: {p}", i + 1)),
                    );
                }
            }
            Err(e) => check.errors.push(format!("{label} #{}: {e}", i + 1)),
        }
    }
    check
}
