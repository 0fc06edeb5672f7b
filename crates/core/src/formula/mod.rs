//! Formula engine for user-authored chart calculations.
//!
//! Formulas reference dataset columns in brackets (`[Sales]`) and call
//! allow-listed functions (`SUM([Sales]) / COUNT([Orders])`). The engine is
//! split into a lexer, a recursive-descent parser producing an [`Expr`] tree,
//! an evaluator over bound [`FormulaValue`]s, and the safety validator used by
//! the validation pipeline.

mod ast;
mod eval;
mod functions;
mod lexer;
mod parser;
mod validator;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::{evaluate, FormulaValue};
pub use functions::{
    find_function, functions_for_chart_type, supported_functions, FunctionCategory, FunctionSpec,
    DENIED_KEYWORDS,
};
pub use lexer::{tokenize, Token};
pub use parser::{parse, MAX_FORMULA_TOKENS, MAX_NESTING_DEPTH};
pub use validator::{evaluate_formula, validate_formula, FormulaValidationResult};

/// Typed failure raised while lexing, parsing, or evaluating a formula.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unterminated column reference starting at position {pos}")]
    UnterminatedColumn { pos: usize },

    #[error("Unterminated string literal starting at position {pos}")]
    UnterminatedString { pos: usize },

    #[error("Unexpected token '{found}' at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    #[error("Unbalanced parentheses")]
    UnbalancedParens,

    #[error("Formula nests deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("Formula has {tokens} tokens, more than the limit of {max}")]
    TooLong { tokens: usize, max: usize },

    #[error("Formula contains disallowed keyword '{0}'")]
    Disallowed(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("No value bound for '{0}'")]
    UnboundParameter(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Division by zero")]
    DivisionByZero,
}
