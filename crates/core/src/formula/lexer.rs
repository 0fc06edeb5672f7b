//! Formula tokenizer.

use super::FormulaError;

/// A lexical token. Keywords (`AND`, `OR`, `NOT`, `TRUE`, `FALSE`, `NULL`)
/// are left as identifiers and recognised by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Column(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Text(s) => write!(f, "'{s}'"),
            Token::Ident(s) => f.write_str(s),
            Token::Column(s) => write!(f, "[{s}]"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::Caret => f.write_str("^"),
            Token::Eq => f.write_str("="),
            Token::NotEq => f.write_str("<>"),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
            Token::AndAnd => f.write_str("&&"),
            Token::OrOr => f.write_str("||"),
            Token::Bang => f.write_str("!"),
        }
    }
}

/// Split a formula into tokens paired with their byte offsets.
pub fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && next_is_digit(input, pos)) {
            let end = scan_while(input, pos, |c| c.is_ascii_digit() || c == '.');
            let literal = &input[pos..end];
            let value = literal
                .parse::<f64>()
                .map_err(|_| FormulaError::UnexpectedToken {
                    found: literal.to_string(),
                    pos,
                })?;
            tokens.push((Token::Number(value), pos));
            advance_to(&mut chars, end);
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let end = scan_while(input, pos, |c| c.is_alphanumeric() || c == '_' || c == '.');
            tokens.push((Token::Ident(input[pos..end].to_string()), pos));
            advance_to(&mut chars, end);
            continue;
        }

        match ch {
            '[' => {
                let rest = &input[pos + 1..];
                let close = rest
                    .find(|c| c == ']' || c == '[')
                    .filter(|&i| rest[i..].starts_with(']'))
                    .ok_or(FormulaError::UnterminatedColumn { pos })?;
                let name = rest[..close].trim().to_string();
                tokens.push((Token::Column(name), pos));
                advance_to(&mut chars, pos + 1 + close + 1);
            }
            '\'' | '"' => {
                let rest = &input[pos + 1..];
                let close = rest
                    .find(ch)
                    .ok_or(FormulaError::UnterminatedString { pos })?;
                tokens.push((Token::Text(rest[..close].to_string()), pos));
                advance_to(&mut chars, pos + 1 + close + ch.len_utf8());
            }
            _ => {
                chars.next();
                let next = chars.peek().map(|&(_, c)| c);
                let (token, two_char) = match (ch, next) {
                    ('<', Some('=')) => (Token::Le, true),
                    ('<', Some('>')) => (Token::NotEq, true),
                    ('>', Some('=')) => (Token::Ge, true),
                    ('!', Some('=')) => (Token::NotEq, true),
                    ('=', Some('=')) => (Token::Eq, true),
                    ('&', Some('&')) => (Token::AndAnd, true),
                    ('|', Some('|')) => (Token::OrOr, true),
                    ('(', _) => (Token::LParen, false),
                    (')', _) => (Token::RParen, false),
                    (',', _) => (Token::Comma, false),
                    ('+', _) => (Token::Plus, false),
                    ('-', _) => (Token::Minus, false),
                    ('*', _) => (Token::Star, false),
                    ('/', _) => (Token::Slash, false),
                    ('%', _) => (Token::Percent, false),
                    ('^', _) => (Token::Caret, false),
                    ('=', _) => (Token::Eq, false),
                    ('<', _) => (Token::Lt, false),
                    ('>', _) => (Token::Gt, false),
                    ('!', _) => (Token::Bang, false),
                    _ => return Err(FormulaError::UnexpectedChar { ch, pos }),
                };
                if two_char {
                    chars.next();
                }
                tokens.push((token, pos));
            }
        }
    }

    Ok(tokens)
}

fn next_is_digit(input: &str, pos: usize) -> bool {
    input[pos + 1..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

fn scan_while(input: &str, start: usize, pred: impl Fn(char) -> bool) -> usize {
    input[start..]
        .char_indices()
        .find(|&(_, c)| !pred(c))
        .map(|(i, _)| start + i)
        .unwrap_or(input.len())
}

fn advance_to(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, end: usize) {
    while chars.peek().is_some_and(|&(i, _)| i < end) {
        chars.next();
    }
}
