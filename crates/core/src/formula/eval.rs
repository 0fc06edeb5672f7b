//! Formula evaluation against bound parameter values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::functions::{find_function, FunctionCategory};
use super::FormulaError;

/// A runtime value produced or consumed by a formula.
///
/// A bracketed column may be bound to a `List` so that aggregate functions
/// see every value of the column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormulaValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FormulaValue>),
}

impl FormulaValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn truthy(&self) -> Result<bool, FormulaError> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Number(n) => Ok(*n != 0.0),
            Self::Null => Ok(false),
            other => Err(FormulaError::TypeMismatch(format!(
                "expected a boolean, got {}",
                other.type_name()
            ))),
        }
    }

    fn number(&self, context: &str) -> Result<f64, FormulaError> {
        self.as_number().ok_or_else(|| {
            FormulaError::TypeMismatch(format!(
                "{context} expects a number, got {}",
                self.type_name()
            ))
        })
    }

    fn text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items.iter().map(Self::text).collect::<Vec<_>>().join(","),
        }
    }
}

impl From<serde_json::Value> for FormulaValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FormulaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Evaluate an expression. Columns and bare identifiers are resolved from
/// `params`, exact name first and then case-insensitively.
pub fn evaluate(
    expr: &Expr,
    params: &HashMap<String, FormulaValue>,
) -> Result<FormulaValue, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(FormulaValue::Number(*n)),
        Expr::Text(s) => Ok(FormulaValue::Text(s.clone())),
        Expr::Bool(b) => Ok(FormulaValue::Bool(*b)),
        Expr::Null => Ok(FormulaValue::Null),
        Expr::Column(name) | Expr::Param(name) => lookup(params, name),
        Expr::Unary { op, expr } => {
            let value = evaluate(expr, params)?;
            match op {
                UnaryOp::Neg => match value {
                    FormulaValue::Null => Ok(FormulaValue::Null),
                    other => Ok(FormulaValue::Number(-other.number("negation")?)),
                },
                UnaryOp::Not => Ok(FormulaValue::Bool(!value.truthy()?)),
            }
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, params),
        Expr::Call { name, args } => eval_call(name, args, params),
    }
}

fn lookup(
    params: &HashMap<String, FormulaValue>,
    name: &str,
) -> Result<FormulaValue, FormulaError> {
    params
        .get(name)
        .or_else(|| {
            params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .cloned()
        .ok_or_else(|| FormulaError::UnboundParameter(name.to_string()))
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    params: &HashMap<String, FormulaValue>,
) -> Result<FormulaValue, FormulaError> {
    // Logical operators short-circuit.
    match op {
        BinaryOp::And => {
            let left = evaluate(lhs, params)?.truthy()?;
            return Ok(FormulaValue::Bool(left && evaluate(rhs, params)?.truthy()?));
        }
        BinaryOp::Or => {
            let left = evaluate(lhs, params)?.truthy()?;
            return Ok(FormulaValue::Bool(left || evaluate(rhs, params)?.truthy()?));
        }
        _ => {}
    }

    let left = evaluate(lhs, params)?;
    let right = evaluate(rhs, params)?;

    match op {
        BinaryOp::Eq => return Ok(FormulaValue::Bool(left == right)),
        BinaryOp::NotEq => return Ok(FormulaValue::Bool(left != right)),
        _ => {}
    }

    if matches!(left, FormulaValue::Null) || matches!(right, FormulaValue::Null) {
        return Ok(FormulaValue::Null);
    }

    if let (BinaryOp::Add, FormulaValue::Text(a), FormulaValue::Text(b)) = (op, &left, &right) {
        return Ok(FormulaValue::Text(format!("{a}{b}")));
    }

    if matches!(op, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge) {
        let ordering = match (&left, &right) {
            (FormulaValue::Text(a), FormulaValue::Text(b)) => a.cmp(b),
            _ => {
                let (a, b) = (left.number("comparison")?, right.number("comparison")?);
                a.partial_cmp(&b).ok_or_else(|| {
                    FormulaError::TypeMismatch("cannot compare NaN".to_string())
                })?
            }
        };
        let result = match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::Le => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            _ => ordering.is_ge(),
        };
        return Ok(FormulaValue::Bool(result));
    }

    let a = left.number("arithmetic")?;
    let b = right.number("arithmetic")?;
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(FormulaError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        BinaryOp::Pow => a.powf(b),
        _ => unreachable!("logical and comparison operators handled above"),
    };
    Ok(FormulaValue::Number(value))
}

fn eval_call(
    name: &str,
    args: &[Expr],
    params: &HashMap<String, FormulaValue>,
) -> Result<FormulaValue, FormulaError> {
    let spec = find_function(name).ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
    if !spec.accepts(args.len()) {
        return Err(FormulaError::Arity {
            name: spec.name.to_string(),
            expected: spec.arity_label(),
            got: args.len(),
        });
    }

    // Conditionals evaluate their branches lazily.
    if matches!(spec.name, "IF" | "IIF") {
        let branch = if evaluate(&args[0], params)?.truthy()? {
            &args[1]
        } else {
            &args[2]
        };
        return evaluate(branch, params);
    }

    let values = args
        .iter()
        .map(|arg| evaluate(arg, params))
        .collect::<Result<Vec<_>, _>>()?;

    match spec.category {
        FunctionCategory::Aggregate => aggregate(spec.name, &values),
        FunctionCategory::Math => math(spec.name, &values),
        FunctionCategory::String => string(spec.name, &values),
        FunctionCategory::Conditional => conditional(spec.name, &values),
    }
}

fn flatten(values: &[FormulaValue]) -> Vec<&FormulaValue> {
    let mut out = Vec::new();
    for value in values {
        match value {
            FormulaValue::List(items) => out.extend(flatten(items)),
            other => out.push(other),
        }
    }
    out
}

fn aggregate(name: &str, values: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    let present: Vec<&FormulaValue> = flatten(values)
        .into_iter()
        .filter(|v| !matches!(v, FormulaValue::Null))
        .collect();

    match name {
        "COUNT" => return Ok(FormulaValue::Number(present.len() as f64)),
        "DISTINCTCOUNT" => {
            let mut seen: Vec<&FormulaValue> = Vec::new();
            for value in present.iter().copied() {
                if !seen.contains(&value) {
                    seen.push(value);
                }
            }
            return Ok(FormulaValue::Number(seen.len() as f64));
        }
        _ => {}
    }

    let numbers = present
        .iter()
        .map(|v| v.number(name))
        .collect::<Result<Vec<f64>, _>>()?;
    if numbers.is_empty() {
        return Ok(if name == "SUM" {
            FormulaValue::Number(0.0)
        } else {
            FormulaValue::Null
        });
    }

    let count = numbers.len() as f64;
    let sum: f64 = numbers.iter().sum();
    let mean = sum / count;
    let value = match name {
        "SUM" => sum,
        "AVG" => mean,
        "MIN" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        "MAX" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "MEDIAN" => {
            let mut sorted = numbers.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
        "STDEV" | "VAR" => {
            if numbers.len() < 2 {
                return Ok(FormulaValue::Null);
            }
            let variance =
                numbers.iter().map(|n| (n - mean).powi(2)).sum::<f64>() / (count - 1.0);
            if name == "VAR" {
                variance
            } else {
                variance.sqrt()
            }
        }
        other => return Err(FormulaError::UnknownFunction(other.to_string())),
    };
    Ok(FormulaValue::Number(value))
}

fn math(name: &str, values: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    if values.iter().any(|v| matches!(v, FormulaValue::Null)) {
        return Ok(FormulaValue::Null);
    }
    let x = values[0].number(name)?;
    let arg = |i: usize| values.get(i).map(|v| v.number(name)).transpose();

    let value = match name {
        "ABS" => x.abs(),
        "ROUND" => {
            let digits = arg(1)?.unwrap_or(0.0) as i32;
            let factor = 10f64.powi(digits);
            (x * factor).round() / factor
        }
        "FLOOR" => x.floor(),
        "CEILING" => x.ceil(),
        "SQRT" => x.sqrt(),
        "POWER" => x.powf(arg(1)?.unwrap_or(1.0)),
        "EXP" => x.exp(),
        "LOG" => match arg(1)? {
            Some(base) => x.log(base),
            None => x.ln(),
        },
        "LOG10" => x.log10(),
        "MOD" => {
            let divisor = arg(1)?.unwrap_or(0.0);
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            x % divisor
        }
        "SIGN" => {
            if x == 0.0 {
                0.0
            } else {
                x.signum()
            }
        }
        other => return Err(FormulaError::UnknownFunction(other.to_string())),
    };
    Ok(FormulaValue::Number(value))
}

fn string(name: &str, values: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    let s = values[0].text();
    let count = |i: usize| -> Result<usize, FormulaError> {
        let n = values[i].number(name)?;
        Ok(if n < 0.0 { 0 } else { n as usize })
    };

    let value = match name {
        "LEN" => return Ok(FormulaValue::Number(s.chars().count() as f64)),
        "UPPER" => s.to_uppercase(),
        "LOWER" => s.to_lowercase(),
        "TRIM" => s.trim().to_string(),
        "CONCAT" => values.iter().map(FormulaValue::text).collect(),
        "LEFT" => s.chars().take(count(1)?).collect(),
        "RIGHT" => {
            let n = count(1)?;
            let len = s.chars().count();
            s.chars().skip(len.saturating_sub(n)).collect()
        }
        "SUBSTRING" => {
            // 1-based start position.
            let start = count(1)?.saturating_sub(1);
            let chars = s.chars().skip(start);
            if values.len() > 2 {
                chars.take(count(2)?).collect()
            } else {
                chars.collect()
            }
        }
        other => return Err(FormulaError::UnknownFunction(other.to_string())),
    };
    Ok(FormulaValue::Text(value))
}

fn conditional(name: &str, values: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    match name {
        "AND" => {
            for v in values {
                if !v.truthy()? {
                    return Ok(FormulaValue::Bool(false));
                }
            }
            Ok(FormulaValue::Bool(true))
        }
        "OR" => {
            for v in values {
                if v.truthy()? {
                    return Ok(FormulaValue::Bool(true));
                }
            }
            Ok(FormulaValue::Bool(false))
        }
        "NOT" => Ok(FormulaValue::Bool(!values[0].truthy()?)),
        "COALESCE" => Ok(values
            .iter()
            .find(|v| !matches!(v, FormulaValue::Null))
            .cloned()
            .unwrap_or(FormulaValue::Null)),
        "ISNULL" => Ok(FormulaValue::Bool(matches!(values[0], FormulaValue::Null))),
        other => Err(FormulaError::UnknownFunction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse;
    use assert_matches::assert_matches;

    fn eval(formula: &str, params: &[(&str, FormulaValue)]) -> Result<FormulaValue, FormulaError> {
        let params: HashMap<String, FormulaValue> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        evaluate(&parse(formula).unwrap(), &params)
    }

    fn num(formula: &str, params: &[(&str, FormulaValue)]) -> f64 {
        eval(formula, params).unwrap().as_number().unwrap()
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(num("1 + 2 * 3 - 4 / 2", &[]), 5.0);
        assert_eq!(num("-2 ^ 2", &[]), 4.0);
        assert_eq!(num("7 % 4", &[]), 3.0);
    }

    #[test]
    fn columns_bind_by_name_ignoring_case() {
        assert_eq!(num("[Price] * qty", &[("price", 2.5.into()), ("QTY", 4.0.into())]), 10.0);
    }

    #[test]
    fn aggregates_flatten_lists() {
        let sales = FormulaValue::List(vec![1.0.into(), 2.0.into(), FormulaValue::Null, 3.0.into()]);
        assert_eq!(num("SUM([Sales])", &[("Sales", sales.clone())]), 6.0);
        assert_eq!(num("COUNT([Sales])", &[("Sales", sales.clone())]), 3.0);
        assert_eq!(num("AVG([Sales])", &[("Sales", sales.clone())]), 2.0);
        assert_eq!(num("MEDIAN([Sales], 10)", &[("Sales", sales)]), 2.5);
    }

    #[test]
    fn distinct_count_ignores_duplicates() {
        let regions = FormulaValue::List(vec!["EU".into(), "US".into(), "EU".into()]);
        assert_eq!(num("DISTINCTCOUNT([Region])", &[("Region", regions)]), 2.0);
    }

    #[test]
    fn sample_standard_deviation() {
        let values = FormulaValue::List(vec![2.0.into(), 4.0.into(), 4.0.into(), 4.0.into(), 5.0.into(), 5.0.into(), 7.0.into(), 9.0.into()]);
        let stdev = num("STDEV([v])", &[("v", values)]);
        assert!((stdev - 2.138).abs() < 0.001);
    }

    #[test]
    fn if_is_lazy() {
        assert_eq!(num("IF(1 > 0, 1, 1 / 0)", &[]), 1.0);
    }

    #[test]
    fn string_functions() {
        assert_eq!(
            eval("UPPER(LEFT('chart', 2)) + RIGHT('chart', 3)", &[]).unwrap(),
            FormulaValue::Text("CHart".into())
        );
        assert_eq!(eval("SUBSTRING('abcdef', 2, 3)", &[]).unwrap(), FormulaValue::Text("bcd".into()));
        assert_eq!(num("LEN(TRIM('  ab '))", &[]), 2.0);
    }

    #[test]
    fn round_with_digits() {
        assert_eq!(num("ROUND(3.14159, 2)", &[]), 3.14);
    }

    #[test]
    fn null_propagates_through_arithmetic() {
        assert_eq!(eval("[x] + 1", &[("x", FormulaValue::Null)]).unwrap(), FormulaValue::Null);
        assert_eq!(num("COALESCE([x], 5)", &[("x", FormulaValue::Null)]), 5.0);
    }

    #[test]
    fn division_by_zero_is_typed() {
        assert_matches!(eval("1 / 0", &[]), Err(FormulaError::DivisionByZero));
        assert_matches!(eval("MOD(3, 0)", &[]), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn unbound_parameter_is_typed() {
        assert_matches!(eval("[Missing] + 1", &[]), Err(FormulaError::UnboundParameter(n)) if n == "Missing");
    }

    #[test]
    fn wrong_arity_is_typed() {
        assert_matches!(eval("IF(1, 2)", &[]), Err(FormulaError::Arity { .. }));
    }

    #[test]
    fn type_mismatch_is_typed() {
        assert_matches!(eval("'a' * 2", &[]), Err(FormulaError::TypeMismatch(_)));
    }

    #[test]
    fn converts_json_values() {
        let value = FormulaValue::from(serde_json::json!([1, "a", null, true]));
        assert_eq!(
            value,
            FormulaValue::List(vec![1.0.into(), "a".into(), FormulaValue::Null, FormulaValue::Bool(true)])
        );
    }
}
