//! Formula and condition expressions
//!
//! A small expression language evaluated over a flat record context. It
//! drives field visibility (`visibleIf`), object validation rules and
//! formula fields.
//!
//! # Grammar
//!
//! From lowest to highest precedence:
//!
//! | Level | Operators |
//! |---|---|
//! | or | `\|\|` |
//! | and | `&&` |
//! | equality | `==` `!=` |
//! | relational / membership | `>` `<` `>=` `<=` `IN` `INCLUDES` `CONTAINS` `STARTS_WITH` |
//! | additive | `+` `-` |
//! | multiplicative | `*` `/` `%` |
//! | unary | `NOT` `!` `-` |
//! | primary | literals, `( )`, `[ ]`, function calls, field names |
//!
//! Functions: `CONCAT LEN UPPER LOWER TRIM ABS ROUND MAX MIN SUM AVG NOW
//! TODAY YEAR MONTH DAY ISNULL ISBLANK NOT IF`, plus call forms of the
//! membership operators (`CONTAINS(a, "x")`).
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use crmrust::expr::{ExpressionEngine, Value};
//!
//! let engine = ExpressionEngine::new();
//! let mut record = HashMap::new();
//! record.insert("amount".to_string(), Value::Number(10.0));
//!
//! let size = engine.evaluate(r#"IF(amount > 5, "big", "small")"#, &record).unwrap();
//! assert_eq!(size, Value::from("big"));
//! ```

pub mod ast;
pub mod condition;
pub mod engine;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{BinaryOp, Expr, Function, UnaryOp};
pub use condition::{conditions_to_expression, ConditionExpr, Operator};
pub use engine::{evaluate, parse, ExpressionEngine, ExpressionError, ExpressionValidation};
pub use eval::{Context, EvalError, EvalResult, Evaluator};
pub use lexer::{tokenize, Span, Token, TokenKind};
pub use parser::{ParseError, ParseResult};
pub use value::Value;
