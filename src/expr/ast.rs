use std::fmt;

use crate::expr::lexer::Span;

/// A parsed formula or condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Null(Span),
    Boolean(bool, Span),
    Number(f64, Span),
    String(String, Span),
    Array(Vec<Expr>, Span),

    /// Field API name resolved against the evaluation context
    Field(String, Span),

    Unary(Box<UnaryExpr>),
    Binary(Box<BinaryExpr>),
    Call(Box<CallExpr>),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Null(span)
            | Expr::Boolean(_, span)
            | Expr::Number(_, span)
            | Expr::String(_, span)
            | Expr::Array(_, span)
            | Expr::Field(_, span) => *span,
            Expr::Unary(unary) => unary.span,
            Expr::Binary(binary) => binary.span,
            Expr::Call(call) => call.span,
        }
    }

    /// Collect the distinct field names referenced by this expression, in
    /// order of first appearance.
    pub fn field_references(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            Expr::Field(name, _) => {
                if !out.iter().any(|existing| existing == name) {
                    out.push(name.clone());
                }
            }
            Expr::Array(items, _) => items.iter().for_each(|item| item.collect_fields(out)),
            Expr::Unary(unary) => unary.operand.collect_fields(out),
            Expr::Binary(binary) => {
                binary.left.collect_fields(out);
                binary.right.collect_fields(out);
            }
            Expr::Call(call) => call.arguments.iter().for_each(|arg| arg.collect_fields(out)),
            Expr::Null(_) | Expr::Boolean(..) | Expr::Number(..) | Expr::String(..) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub operator: UnaryOp,
    pub operand: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub left: Expr,
    pub operator: BinaryOp,
    pub right: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Logical
    Or,
    And,

    // Equality
    Equal,
    NotEqual,

    // Relational and membership
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
    In,
    Includes,
    Contains,
    StartsWith,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::In => "IN",
            BinaryOp::Includes => "INCLUDES",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::StartsWith => "STARTS_WITH",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub function: Function,
    pub arguments: Vec<Expr>,
    pub span: Span,
}

/// The fixed function library. Names are matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Concat,
    Len,
    Upper,
    Lower,
    Trim,
    Abs,
    Round,
    Max,
    Min,
    Sum,
    Avg,
    Now,
    Today,
    Year,
    Month,
    Day,
    IsNull,
    IsBlank,
    Not,
    If,
    // Call forms of the membership operators, e.g. CONTAINS(a, "x")
    Contains,
    StartsWith,
    Includes,
    In,
}

/// Accepted argument counts: (minimum, maximum). `None` means variadic.
pub type Arity = (usize, Option<usize>);

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        let function = match name {
            "CONCAT" => Function::Concat,
            "LEN" => Function::Len,
            "UPPER" => Function::Upper,
            "LOWER" => Function::Lower,
            "TRIM" => Function::Trim,
            "ABS" => Function::Abs,
            "ROUND" => Function::Round,
            "MAX" => Function::Max,
            "MIN" => Function::Min,
            "SUM" => Function::Sum,
            "AVG" => Function::Avg,
            "NOW" => Function::Now,
            "TODAY" => Function::Today,
            "YEAR" => Function::Year,
            "MONTH" => Function::Month,
            "DAY" => Function::Day,
            "ISNULL" => Function::IsNull,
            "ISBLANK" => Function::IsBlank,
            "NOT" => Function::Not,
            "IF" => Function::If,
            "CONTAINS" => Function::Contains,
            "STARTS_WITH" => Function::StartsWith,
            "INCLUDES" => Function::Includes,
            "IN" => Function::In,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Concat => "CONCAT",
            Function::Len => "LEN",
            Function::Upper => "UPPER",
            Function::Lower => "LOWER",
            Function::Trim => "TRIM",
            Function::Abs => "ABS",
            Function::Round => "ROUND",
            Function::Max => "MAX",
            Function::Min => "MIN",
            Function::Sum => "SUM",
            Function::Avg => "AVG",
            Function::Now => "NOW",
            Function::Today => "TODAY",
            Function::Year => "YEAR",
            Function::Month => "MONTH",
            Function::Day => "DAY",
            Function::IsNull => "ISNULL",
            Function::IsBlank => "ISBLANK",
            Function::Not => "NOT",
            Function::If => "IF",
            Function::Contains => "CONTAINS",
            Function::StartsWith => "STARTS_WITH",
            Function::Includes => "INCLUDES",
            Function::In => "IN",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Function::Now | Function::Today => (0, Some(0)),
            Function::Len
            | Function::Upper
            | Function::Lower
            | Function::Trim
            | Function::Abs
            | Function::Year
            | Function::Month
            | Function::Day
            | Function::IsNull
            | Function::IsBlank
            | Function::Not => (1, Some(1)),
            Function::Round => (1, Some(2)),
            Function::Contains | Function::StartsWith | Function::Includes | Function::In => {
                (2, Some(2))
            }
            Function::If => (3, Some(3)),
            Function::Concat => (0, None),
            Function::Max | Function::Min | Function::Sum | Function::Avg => (1, None),
        }
    }

    /// The binary operator a membership call form is equivalent to
    pub fn as_operator(&self) -> Option<BinaryOp> {
        match self {
            Function::Contains => Some(BinaryOp::Contains),
            Function::StartsWith => Some(BinaryOp::StartsWith),
            Function::Includes => Some(BinaryOp::Includes),
            Function::In => Some(BinaryOp::In),
            _ => None,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
