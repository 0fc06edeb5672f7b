/// Parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
    /// A bracketed column reference, without the brackets.
    Column(String),
    /// A bare identifier bound by name at evaluation time.
    Param(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Expr {
    /// Visit every function call in the tree, outermost first.
    pub fn for_each_call<'a>(&'a self, f: &mut impl FnMut(&'a str, &'a [Expr])) {
        match self {
            Expr::Unary { expr, .. } => expr.for_each_call(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_call(f);
                rhs.for_each_call(f);
            }
            Expr::Call { name, args } => {
                f(name, args);
                for arg in args {
                    arg.for_each_call(f);
                }
            }
            _ => {}
        }
    }
}
