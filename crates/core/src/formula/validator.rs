//! Formula safety validation.
//!
//! Column references and function names are extracted with regexes; syntax
//! is checked with the real parser after substituting `1` for every column
//! reference, so unbalanced parentheses and malformed operator sequences are
//! hard errors.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::eval::{evaluate, FormulaValue};
use super::functions::{denied_keyword, find_function, functions_for_chart_type};
use super::parser::parse;
use super::FormulaError;

static COLUMN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]").expect("valid regex"));

static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex"));

static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).expect("valid regex"));

/// Outcome of validating one formula.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormulaValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Column names referenced in brackets, first occurrence order.
    pub columns: Vec<String>,
    /// Function names as written, first occurrence order.
    pub functions: Vec<String>,
    /// The original formula text when it parses, `None` otherwise.
    pub normalized_formula: Option<String>,
}

/// Validate a formula for a chart type against the dataset's columns.
///
/// Unknown columns and chart-type incompatibilities are warnings; denied
/// keywords, unknown functions, wrong arity and syntax errors are errors.
pub fn validate_formula(
    formula: &str,
    chart_type: &str,
    available_columns: &[String],
) -> FormulaValidationResult {
    let mut result = FormulaValidationResult::default();

    if formula.trim().is_empty() {
        result.errors.push("Formula is empty".to_string());
        return result;
    }

    if let Some(keyword) = denied_keyword(formula) {
        result
            .errors
            .push(format!("Formula contains disallowed keyword '{keyword}'"));
    }

    result.columns = extract_columns(formula);
    for column in &result.columns {
        let known = available_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column));
        if !known {
            result
                .warnings
                .push(format!("Column '{column}' was not found in the dataset"));
        }
    }

    result.functions = extract_functions(formula);
    let compatible = functions_for_chart_type(chart_type);
    for function in &result.functions {
        match find_function(function) {
            None => result
                .errors
                .push(format!("Function '{function}' is not allowed")),
            Some(spec) if !compatible.contains(&spec.name) => result.warnings.push(format!(
                "Function '{function}' may not be compatible with '{chart_type}' charts"
            )),
            Some(_) => {}
        }
    }

    let substituted = COLUMN_RE.replace_all(formula, "1");
    match parse(&substituted) {
        Ok(expr) => {
            expr.for_each_call(&mut |name, args| {
                if let Some(spec) = find_function(name) {
                    if !spec.accepts(args.len()) {
                        result.errors.push(
                            FormulaError::Arity {
                                name: spec.name.to_string(),
                                expected: spec.arity_label(),
                                got: args.len(),
                            }
                            .to_string(),
                        );
                    }
                }
            });
            result.normalized_formula = Some(formula.to_string());
        }
        Err(e) => result.errors.push(format!("Syntax error: {e}")),
    }

    result.is_valid = result.errors.is_empty();
    result
}

/// Parse and evaluate a formula with bound parameters.
///
/// Denied keywords are rejected before evaluation; every other failure is a
/// typed [`FormulaError`].
pub fn evaluate_formula(
    formula: &str,
    params: &HashMap<String, FormulaValue>,
) -> Result<FormulaValue, FormulaError> {
    if let Some(keyword) = denied_keyword(formula) {
        return Err(FormulaError::Disallowed(keyword.to_string()));
    }
    let expr = parse(formula)?;
    evaluate(&expr, params)
}

fn extract_columns(formula: &str) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for cap in COLUMN_RE.captures_iter(formula) {
        let name = cap[1].trim().to_string();
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(&name)) {
            columns.push(name);
        }
    }
    columns
}

fn extract_functions(formula: &str) -> Vec<String> {
    // Column names and string literals may contain text that looks like a call.
    let without_columns = COLUMN_RE.replace_all(formula, "1");
    let scrubbed = STRING_RE.replace_all(&without_columns, "''");

    let mut functions: Vec<String> = Vec::new();
    for cap in FUNCTION_RE.captures_iter(&scrubbed) {
        let name = cap[1].to_string();
        let start = cap.get(1).map_or(0, |m| m.start());
        let is_infix = ["AND", "OR"].iter().any(|k| k.eq_ignore_ascii_case(&name))
            && follows_operand(&scrubbed[..start]);
        if is_infix {
            continue;
        }
        if !functions.iter().any(|f| f.eq_ignore_ascii_case(&name)) {
            functions.push(name);
        }
    }
    functions
}

/// Whether `before` ends with a complete operand, so that a following
/// `AND`/`OR` is an infix operator rather than a call.
fn follows_operand(before: &str) -> bool {
    let trimmed = before.trim_end();
    match trimmed.chars().last() {
        Some(')' | '\'' | '"') => true,
        Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
            let word_start = trimmed
                .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
                .map_or(0, |i| i + 1);
            let word = &trimmed[word_start..];
            !["AND", "OR", "NOT"].iter().any(|k| k.eq_ignore_ascii_case(word))
        }
        _ => false,
    }
}
