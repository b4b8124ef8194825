//! Tree-walking evaluator for parsed expressions.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use thiserror::Error;

use crate::expr::ast::*;
use crate::expr::lexer::Span;
use crate::expr::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Cannot apply {operation} to {found} at {span:?}")]
    TypeMismatch {
        operation: String,
        found: String,
        span: Span,
    },
    #[error("Division by zero at {span:?}")]
    DivisionByZero { span: Span },
    #[error("Date out of range at {span:?}")]
    DateOutOfRange { span: Span },
    #[error("Invalid argument to {function}: {message} at {span:?}")]
    InvalidArgument {
        function: Function,
        message: String,
        span: Span,
    },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::TypeMismatch { span, .. }
            | EvalError::DivisionByZero { span }
            | EvalError::DateOutOfRange { span }
            | EvalError::InvalidArgument { span, .. } => *span,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Source of field values for an evaluation. Missing names are `None` and
/// evaluate to `Value::Null`.
pub trait Context {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Context for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Context for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Context for HashMap<String, serde_json::Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::from)
    }
}

impl Context for serde_json::Map<String, serde_json::Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::from)
    }
}

pub struct Evaluator<'c, C: Context + ?Sized> {
    context: &'c C,
    now: DateTime<Utc>,
}

impl<'c, C: Context + ?Sized> Evaluator<'c, C> {
    pub fn new(context: &'c C) -> Self {
        Self {
            context,
            now: Utc::now(),
        }
    }

    /// Pin the clock used by NOW() and TODAY()
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Null(_) => Ok(Value::Null),
            Expr::Boolean(b, _) => Ok(Value::Bool(*b)),
            Expr::Number(n, _) => Ok(Value::Number(*n)),
            Expr::String(s, _) => Ok(Value::Text(s.clone())),
            Expr::Array(items, _) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::List),
            Expr::Field(name, _) => Ok(self.context.lookup(name).unwrap_or(Value::Null)),
            Expr::Unary(unary) => self.eval_unary(unary),
            Expr::Binary(binary) => self.eval_binary(binary),
            Expr::Call(call) => self.eval_call(call),
        }
    }

    fn eval_unary(&self, unary: &UnaryExpr) -> EvalResult<Value> {
        let operand = self.evaluate(&unary.operand)?;
        match unary.operator {
            UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
            UnaryOp::Negate => {
                let n = arithmetic_operand(&operand, "negation", unary.span)?;
                Ok(Value::Number(-n))
            }
        }
    }

    fn eval_binary(&self, binary: &BinaryExpr) -> EvalResult<Value> {
        // Logical operators short-circuit
        match binary.operator {
            BinaryOp::And => {
                let left = self.evaluate(&binary.left)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let right = self.evaluate(&binary.right)?;
                return Ok(Value::Bool(right.is_truthy()));
            }
            BinaryOp::Or => {
                let left = self.evaluate(&binary.left)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let right = self.evaluate(&binary.right)?;
                return Ok(Value::Bool(right.is_truthy()));
            }
            _ => {}
        }

        let left = self.evaluate(&binary.left)?;
        let right = self.evaluate(&binary.right)?;
        apply_binary(binary.operator, &left, &right, binary.span)
    }

    fn eval_call(&self, call: &CallExpr) -> EvalResult<Value> {
        let span = call.span;

        // IF evaluates only the selected branch
        if call.function == Function::If {
            let condition = self.evaluate(&call.arguments[0])?;
            let branch = if condition.is_truthy() { 1 } else { 2 };
            return self.evaluate(&call.arguments[branch]);
        }

        let args = call
            .arguments
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<EvalResult<Vec<_>>>()?;

        self.apply_function(call.function, &args, span)
    }

    /// Apply a function to already-evaluated arguments. Arity was checked
    /// by the parser.
    fn apply_function(&self, function: Function, args: &[Value], span: Span) -> EvalResult<Value> {
        match function {
            Function::Concat => Ok(Value::Text(
                args.iter().map(Value::as_text).collect::<Vec<_>>().concat(),
            )),
            Function::Len => Ok(Value::Number(match &args[0] {
                Value::Null => 0.0,
                Value::List(items) => items.len() as f64,
                other => other.as_text().chars().count() as f64,
            })),
            Function::Upper => Ok(map_text(&args[0], |s| s.to_uppercase())),
            Function::Lower => Ok(map_text(&args[0], |s| s.to_lowercase())),
            Function::Trim => Ok(map_text(&args[0], |s| s.trim().to_string())),
            Function::Abs => match &args[0] {
                Value::Null => Ok(Value::Null),
                other => Ok(Value::Number(number_argument(function, other, span)?.abs())),
            },
            Function::Round => {
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                let n = number_argument(function, &args[0], span)?;
                let digits = match args.get(1) {
                    Some(Value::Null) | None => 0,
                    Some(d) => number_argument(function, d, span)? as i32,
                };
                let factor = 10f64.powi(digits);
                Ok(Value::Number((n * factor).round() / factor))
            }
            Function::Max | Function::Min => {
                let numbers = collect_numbers(function, &args, span)?;
                let picked = if function == Function::Max {
                    numbers.into_iter().reduce(f64::max)
                } else {
                    numbers.into_iter().reduce(f64::min)
                };
                Ok(picked.map(Value::Number).unwrap_or(Value::Null))
            }
            Function::Sum => {
                let numbers = collect_numbers(function, &args, span)?;
                Ok(Value::Number(numbers.iter().sum()))
            }
            Function::Avg => {
                let numbers = collect_numbers(function, &args, span)?;
                if numbers.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64))
            }
            Function::Now => Ok(Value::DateTime(self.now)),
            Function::Today => Ok(Value::Date(self.now.date_naive())),
            Function::Year | Function::Month | Function::Day => {
                if args[0].is_null() {
                    return Ok(Value::Null);
                }
                let date = args[0].as_date().ok_or_else(|| EvalError::InvalidArgument {
                    function: function,
                    message: format!("expected a date, found {}", args[0].type_name()),
                    span,
                })?;
                let part = match function {
                    Function::Year => date.year(),
                    Function::Month => date.month() as i32,
                    _ => date.day() as i32,
                };
                Ok(Value::Number(part as f64))
            }
            Function::IsNull => Ok(Value::Bool(args[0].is_null())),
            Function::IsBlank => Ok(Value::Bool(args[0].is_blank())),
            Function::Not => Ok(Value::Bool(!args[0].is_truthy())),
            Function::If => Ok(if args[0].is_truthy() {
                args[1].clone()
            } else {
                args[2].clone()
            }),
            Function::Contains => apply_binary(BinaryOp::Contains, &args[0], &args[1], span),
            Function::StartsWith => apply_binary(BinaryOp::StartsWith, &args[0], &args[1], span),
            Function::Includes => apply_binary(BinaryOp::Includes, &args[0], &args[1], span),
            Function::In => apply_binary(BinaryOp::In, &args[0], &args[1], span),
        }
    }
}

/// Apply a non-short-circuit binary operator to evaluated operands
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value, span: Span) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Equal => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEqual => Value::Bool(!left.loose_eq(right)),
        BinaryOp::LessThan => Value::Bool(left.compare(right).is_some_and(|o| o.is_lt())),
        BinaryOp::GreaterThan => Value::Bool(left.compare(right).is_some_and(|o| o.is_gt())),
        BinaryOp::LessOrEqual => Value::Bool(left.compare(right).is_some_and(|o| o.is_le())),
        BinaryOp::GreaterOrEqual => Value::Bool(left.compare(right).is_some_and(|o| o.is_ge())),
        BinaryOp::In => Value::Bool(is_member(left, right)),
        BinaryOp::Includes => {
            let haystack = left.as_list();
            let wanted = match right {
                Value::List(items) => items.clone(),
                other => vec![other.clone()],
            };
            Value::Bool(
                wanted
                    .iter()
                    .any(|w| haystack.iter().any(|item| item.loose_eq(w))),
            )
        }
        BinaryOp::Contains => Value::Bool(match left {
            Value::Null => false,
            Value::List(items) => items.iter().any(|item| item.loose_eq(right)),
            other => !right.is_null() && other.as_text().contains(&right.as_text()),
        }),
        BinaryOp::StartsWith => Value::Bool(match (left, right) {
            (Value::Null, _) | (_, Value::Null) => false,
            _ => left.as_text().starts_with(&right.as_text()),
        }),
        BinaryOp::Add => add(left, right, span)?,
        BinaryOp::Subtract => subtract(left, right, span)?,
        BinaryOp::Multiply => {
            let (a, b) = numeric_pair(left, right, "*", span)?;
            Value::Number(a * b)
        }
        BinaryOp::Divide => {
            let (a, b) = numeric_pair(left, right, "/", span)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero { span });
            }
            Value::Number(a / b)
        }
        BinaryOp::Modulo => {
            let (a, b) = numeric_pair(left, right, "%", span)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero { span });
            }
            Value::Number(a % b)
        }
        BinaryOp::And => Value::Bool(left.is_truthy() && right.is_truthy()),
        BinaryOp::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
    };
    Ok(result)
}

fn is_member(needle: &Value, haystack: &Value) -> bool {
    match (needle, haystack) {
        (_, Value::Null) => false,
        (Value::List(items), _) => items.iter().any(|item| is_member(item, haystack)),
        (_, Value::List(items)) => items.iter().any(|item| item.loose_eq(needle)),
        (_, Value::Text(text)) => !needle.is_null() && text.contains(&needle.as_text()),
        _ => needle.loose_eq(haystack),
    }
}

fn add(left: &Value, right: &Value, span: Span) -> EvalResult<Value> {
    match (left, right) {
        (Value::Text(_), _) | (_, Value::Text(_)) => {
            Ok(Value::Text(format!("{}{}", left.as_text(), right.as_text())))
        }
        (Value::Date(d), Value::Number(n)) | (Value::Number(n), Value::Date(d)) => {
            shift_date(*d, *n, span).map(Value::Date)
        }
        (Value::DateTime(dt), Value::Number(n)) | (Value::Number(n), Value::DateTime(dt)) => {
            shift_datetime(*dt, *n, span).map(Value::DateTime)
        }
        _ => {
            let (a, b) = numeric_pair(left, right, "+", span)?;
            Ok(Value::Number(a + b))
        }
    }
}

fn subtract(left: &Value, right: &Value, span: Span) -> EvalResult<Value> {
    match (left, right) {
        (Value::Date(a), Value::Date(b)) => Ok(Value::Number((*a - *b).num_days() as f64)),
        (Value::DateTime(a), Value::DateTime(b)) => {
            Ok(Value::Number((*a - *b).num_seconds() as f64 / 86_400.0))
        }
        (Value::Date(d), Value::Number(n)) => shift_date(*d, -*n, span).map(Value::Date),
        (Value::DateTime(dt), Value::Number(n)) => {
            shift_datetime(*dt, -*n, span).map(Value::DateTime)
        }
        _ => {
            let (a, b) = numeric_pair(left, right, "-", span)?;
            Ok(Value::Number(a - b))
        }
    }
}

/// Move a date by whole days. Fractions are truncated.
fn shift_date(date: NaiveDate, days: f64, span: Span) -> EvalResult<NaiveDate> {
    Duration::try_days(days as i64)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or(EvalError::DateOutOfRange { span })
}

fn shift_datetime(at: DateTime<Utc>, days: f64, span: Span) -> EvalResult<DateTime<Utc>> {
    Duration::try_seconds((days * 86_400.0) as i64)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or(EvalError::DateOutOfRange { span })
}

/// Null counts as zero in arithmetic; everything else must be numeric
fn arithmetic_operand(value: &Value, operation: &str, span: Span) -> EvalResult<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => Ok(*n),
        Value::Text(s) => s.trim().parse::<f64>().map_err(|_| EvalError::TypeMismatch {
            operation: operation.to_string(),
            found: format!("text \"{}\"", s),
            span,
        }),
        other => Err(EvalError::TypeMismatch {
            operation: operation.to_string(),
            found: other.type_name().to_string(),
            span,
        }),
    }
}

fn numeric_pair(left: &Value, right: &Value, operation: &str, span: Span) -> EvalResult<(f64, f64)> {
    Ok((
        arithmetic_operand(left, operation, span)?,
        arithmetic_operand(right, operation, span)?,
    ))
}

fn number_argument(function: Function, value: &Value, span: Span) -> EvalResult<f64> {
    value.as_number().ok_or_else(|| EvalError::InvalidArgument {
        function,
        message: format!("expected a number, found {}", value.type_name()),
        span,
    })
}

/// Flatten list arguments and skip nulls
fn collect_numbers(function: Function, args: &[Value], span: Span) -> EvalResult<Vec<f64>> {
    let mut numbers = Vec::new();
    for arg in args {
        let items = match arg {
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        };
        for item in items.iter().filter(|item| !item.is_null()) {
            numbers.push(number_argument(function, item, span)?);
        }
    }
    Ok(numbers)
}

fn map_text(value: &Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::Text(f(&other.as_text())),
    }
}
