//! Function allow-list, chart-type compatibility table and deny-list.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCategory {
    Math,
    Aggregate,
    String,
    Conditional,
}

/// One allow-listed function and its accepted argument count.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub category: FunctionCategory,
    pub min_args: usize,
    /// `None` means variadic.
    pub max_args: Option<usize>,
}

impl FunctionSpec {
    const fn new(
        name: &'static str,
        category: FunctionCategory,
        min_args: usize,
        max_args: Option<usize>,
    ) -> Self {
        Self {
            name,
            category,
            min_args,
            max_args,
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    pub fn arity_label(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{}-{max}", self.min_args),
            None => format!("at least {}", self.min_args),
        }
    }
}

use FunctionCategory::{Aggregate, Conditional, Math, String as Str};

/// Every function a formula may call. Names match case-insensitively.
pub const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec::new("ABS", Math, 1, Some(1)),
    FunctionSpec::new("ROUND", Math, 1, Some(2)),
    FunctionSpec::new("FLOOR", Math, 1, Some(1)),
    FunctionSpec::new("CEILING", Math, 1, Some(1)),
    FunctionSpec::new("SQRT", Math, 1, Some(1)),
    FunctionSpec::new("POWER", Math, 2, Some(2)),
    FunctionSpec::new("EXP", Math, 1, Some(1)),
    FunctionSpec::new("LOG", Math, 1, Some(2)),
    FunctionSpec::new("LOG10", Math, 1, Some(1)),
    FunctionSpec::new("MOD", Math, 2, Some(2)),
    FunctionSpec::new("SIGN", Math, 1, Some(1)),
    FunctionSpec::new("SUM", Aggregate, 1, None),
    FunctionSpec::new("AVG", Aggregate, 1, None),
    FunctionSpec::new("COUNT", Aggregate, 1, None),
    FunctionSpec::new("DISTINCTCOUNT", Aggregate, 1, None),
    FunctionSpec::new("MIN", Aggregate, 1, None),
    FunctionSpec::new("MAX", Aggregate, 1, None),
    FunctionSpec::new("MEDIAN", Aggregate, 1, None),
    FunctionSpec::new("STDEV", Aggregate, 1, None),
    FunctionSpec::new("VAR", Aggregate, 1, None),
    FunctionSpec::new("LEN", Str, 1, Some(1)),
    FunctionSpec::new("UPPER", Str, 1, Some(1)),
    FunctionSpec::new("LOWER", Str, 1, Some(1)),
    FunctionSpec::new("TRIM", Str, 1, Some(1)),
    FunctionSpec::new("CONCAT", Str, 1, None),
    FunctionSpec::new("LEFT", Str, 2, Some(2)),
    FunctionSpec::new("RIGHT", Str, 2, Some(2)),
    FunctionSpec::new("SUBSTRING", Str, 2, Some(3)),
    FunctionSpec::new("IF", Conditional, 3, Some(3)),
    FunctionSpec::new("IIF", Conditional, 3, Some(3)),
    FunctionSpec::new("AND", Conditional, 1, None),
    FunctionSpec::new("OR", Conditional, 1, None),
    FunctionSpec::new("NOT", Conditional, 1, Some(1)),
    FunctionSpec::new("COALESCE", Conditional, 1, None),
    FunctionSpec::new("ISNULL", Conditional, 1, Some(1)),
];

const SCALAR_HELPERS: &[&str] = &["ROUND", "ABS", "IF", "IIF", "COALESCE", "ISNULL"];

/// Chart types with a restricted function subset. Chart types not listed
/// here accept the full allow-list.
const CHART_TYPE_FUNCTIONS: &[(&str, &[&str])] = &[
    ("pie", &["SUM", "COUNT", "DISTINCTCOUNT", "AVG"]),
    ("donut", &["SUM", "COUNT", "DISTINCTCOUNT", "AVG"]),
    ("kpi", &["SUM", "COUNT", "DISTINCTCOUNT", "AVG", "MIN", "MAX"]),
    (
        "scatter",
        &["AVG", "SUM", "MIN", "MAX", "MEDIAN", "STDEV", "VAR", "SQRT", "LOG", "LOG10", "POWER"],
    ),
    (
        "line",
        &["SUM", "AVG", "COUNT", "MIN", "MAX", "MEDIAN", "DISTINCTCOUNT", "STDEV"],
    ),
    (
        "area",
        &["SUM", "AVG", "COUNT", "MIN", "MAX", "MEDIAN", "DISTINCTCOUNT"],
    ),
];

/// Case-insensitive fragments that are never allowed anywhere in a formula.
///
/// These cover runtime reflection, filesystem, process and environment
/// access. Matching is substring-based, so this is a guard rail and not a
/// sandbox.
pub const DENIED_KEYWORDS: &[&str] = &[
    "system.",
    "reflection",
    "assembly",
    "activator",
    "gettype",
    "invoke",
    "process",
    "filesystem",
    "file.",
    "directory.",
    "environment.",
    "appdomain",
    "marshal",
    "thread.",
];

/// Look up an allow-listed function by name, ignoring case.
pub fn find_function(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Names of every allow-listed function.
pub fn supported_functions() -> Vec<&'static str> {
    FUNCTIONS.iter().map(|f| f.name).collect()
}

/// Function names compatible with a chart type.
///
/// Restricted chart types also accept the scalar helpers (`ROUND`, `IF`,
/// ...), since those never change the shape of the result.
pub fn functions_for_chart_type(chart_type: &str) -> Vec<&'static str> {
    let key = chart_type.trim().to_ascii_lowercase();
    match CHART_TYPE_FUNCTIONS.iter().find(|(t, _)| *t == key) {
        Some((_, subset)) => FUNCTIONS
            .iter()
            .map(|f| f.name)
            .filter(|name| subset.contains(name) || SCALAR_HELPERS.contains(name))
            .collect(),
        None => supported_functions(),
    }
}

/// The first denied keyword contained in `formula`, if any.
pub(crate) fn denied_keyword(formula: &str) -> Option<&'static str> {
    let lowered = formula.to_ascii_lowercase();
    DENIED_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find_function("sum").map(|f| f.name), Some("SUM"));
        assert!(find_function("Exec").is_none());
    }

    #[test]
    fn unknown_chart_type_gets_full_list() {
        assert_eq!(functions_for_chart_type("sankey"), supported_functions());
    }

    #[test]
    fn pie_allows_sum_but_not_stdev() {
        let pie = functions_for_chart_type("Pie");
        assert!(pie.contains(&"SUM"));
        assert!(pie.contains(&"ROUND"));
        assert!(!pie.contains(&"STDEV"));
    }

    #[test]
    fn arity_labels() {
        assert_eq!(find_function("IF").unwrap().arity_label(), "3");
        assert_eq!(find_function("ROUND").unwrap().arity_label(), "1-2");
        assert_eq!(find_function("SUM").unwrap().arity_label(), "at least 1");
    }

    #[test]
    fn denied_keywords_match_anywhere() {
        assert_eq!(denied_keyword("SUM([x]) + System.IO.File"), Some("system."));
        assert_eq!(denied_keyword("getType()"), Some("gettype"));
        assert_eq!(denied_keyword("SUM([Sales])"), None);
    }
}
