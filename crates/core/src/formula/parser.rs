//! Recursive-descent parser.
//!
//! Precedence, loosest first: `OR`/`||`, `AND`/`&&`, comparisons,
//! `+ -`, `* / %`, `^` (right-associative), unary `- ! NOT`.
//!
//! `AND`, `OR` and `NOT` directly followed by `(` are calls when they stand
//! where an operand is expected; after an operand, `AND` and `OR` are always
//! infix operators.
//!
//! Both the token count and the nesting depth are bounded so that neither
//! parsing nor walking the resulting tree can exhaust the stack.

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::lexer::{tokenize, Token};
use super::FormulaError;

/// Deepest nesting of parentheses, call arguments, unary operators and
/// `^` chains the parser accepts.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Longest formula, in tokens, the parser accepts. Bounds the height of
/// left-associative operator chains.
pub const MAX_FORMULA_TOKENS: usize = 512;

/// Parse a formula into an expression tree.
pub fn parse(input: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(input)?;
    if tokens.len() > MAX_FORMULA_TOKENS {
        return Err(FormulaError::TooLong {
            tokens: tokens.len(),
            max: MAX_FORMULA_TOKENS,
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(Token::RParen) => Err(FormulaError::UnbalancedParens),
        Some(token) => Err(parser.unexpected(token.clone())),
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, found: Token) -> FormulaError {
        let pos = self
            .tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or_default();
        FormulaError::UnexpectedToken {
            found: found.to_string(),
            pos,
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    /// A keyword in operand position, unless it opens a call.
    fn peek_prefix_keyword(&self, keyword: &str) -> bool {
        self.peek_keyword(keyword)
            && !matches!(self.tokens.get(self.pos + 1), Some((Token::LParen, _)))
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, FormulaError>,
    ) -> Result<T, FormulaError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(FormulaError::TooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        self.nested(Self::or)
    }

    fn or(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.and()?;
        while matches!(self.peek(), Some(Token::OrOr)) || self.peek_keyword("OR") {
            self.next();
            let rhs = self.and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.comparison()?;
        while matches!(self.peek(), Some(Token::AndAnd)) || self.peek_keyword("AND") {
            self.next();
            let rhs = self.comparison()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.power()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.unary()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.next();
            let exponent = self.nested(Self::power)?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Bang) => Some(UnaryOp::Not),
            _ if self.peek_prefix_keyword("NOT") => Some(UnaryOp::Not),
            _ => None,
        };
        match op {
            Some(op) => {
                self.next();
                let expr = self.nested(Self::unary)?;
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                })
            }
            None => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let token = self.next().ok_or(FormulaError::UnexpectedEnd)?;
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Text(s) => Ok(Expr::Text(s)),
            Token::Column(name) => Ok(Expr::Column(name)),
            Token::LParen => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    None => Err(FormulaError::UnbalancedParens),
                    Some(other) => {
                        self.pos -= 1;
                        Err(self.unexpected(other))
                    }
                }
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.next();
                    let args = self.arguments()?;
                    return Ok(Expr::Call { name, args });
                }
                Ok(match name.to_ascii_uppercase().as_str() {
                    "TRUE" => Expr::Bool(true),
                    "FALSE" => Expr::Bool(false),
                    "NULL" => Expr::Null,
                    _ => Expr::Param(name),
                })
            }
            other => {
                self.pos -= 1;
                Err(self.unexpected(other))
            }
        }
    }

    /// Parse a comma-separated argument list after the opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                None => return Err(FormulaError::UnbalancedParens),
                Some(other) => {
                    self.pos -= 1;
                    return Err(self.unexpected(other));
                }
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
