//! Expression engine behavior through the public API

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use chrono::{NaiveDate, TimeZone, Utc};
use crmrust::config::{ErrorPolicy, ExpressionConfig};
use crmrust::expr::{
    evaluate, ConditionExpr, EvalError, ExpressionEngine, ExpressionError, Operator, ParseError,
    Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn ctx(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap()
}

fn eval(source: &str, context: serde_json::Value) -> Value {
    evaluate(source, &ctx(context)).unwrap()
}

#[test]
fn test_not_of_equality() {
    assert_eq!(eval("NOT (a == 1)", json!({ "a": 1 })), Value::Bool(false));
    assert_eq!(eval("NOT (a == 1)", json!({ "a": 2 })), Value::Bool(true));
}

#[test]
fn test_contains_call_form() {
    assert_eq!(eval(r#"CONTAINS(a, "x")"#, json!({ "a": "foxy" })), Value::Bool(true));
    assert_eq!(eval(r#"CONTAINS(a, "z")"#, json!({ "a": "foxy" })), Value::Bool(false));
}

#[test]
fn test_if_ternary() {
    assert_eq!(eval(r#"IF(a > 5, "big", "small")"#, json!({ "a": 10 })), Value::from("big"));
    assert_eq!(eval(r#"IF(a > 5, "big", "small")"#, json!({ "a": 1 })), Value::from("small"));
}

#[test]
fn test_precedence() {
    assert_eq!(eval("1 + 2 * 3", json!({})), Value::Number(7.0));
    assert_eq!(eval("(1 + 2) * 3", json!({})), Value::Number(9.0));
    assert_eq!(eval("true || false && false", json!({})), Value::Bool(true));
    assert_eq!(eval("10 % 4 == 2 && 3 > 2", json!({})), Value::Bool(true));
}

#[test]
fn test_membership_operators() {
    let context = json!({ "stage": "Won", "tags": ["vip", "partner"], "name": "Acme Corp" });
    assert_eq!(eval(r#"stage IN ["Won", "Lost"]"#, context.clone()), Value::Bool(true));
    assert_eq!(eval(r#"tags INCLUDES "vip""#, context.clone()), Value::Bool(true));
    assert_eq!(eval(r#"name STARTS_WITH "Acme""#, context.clone()), Value::Bool(true));
    assert_eq!(eval(r#"name CONTAINS "Corp""#, context), Value::Bool(true));
}

#[test]
fn test_missing_field_is_null() {
    assert_eq!(eval("missing", json!({})), Value::Null);
    assert_eq!(eval("ISNULL(missing)", json!({})), Value::Bool(true));
    assert_eq!(eval("ISBLANK(name)", json!({ "name": "  " })), Value::Bool(true));
}

#[test]
fn test_function_library() {
    let context = json!({ "first": "ada", "last": "Lovelace", "scores": [3, 9, 6] });
    assert_eq!(
        eval(r#"CONCAT(UPPER(first), " ", last)"#, context.clone()),
        Value::from("ADA Lovelace")
    );
    assert_eq!(eval("LEN(TRIM(\"  hi  \"))", json!({})), Value::Number(2.0));
    assert_eq!(eval("MAX(scores)", context.clone()), Value::Number(9.0));
    assert_eq!(eval("MIN(4, 2, 8)", json!({})), Value::Number(2.0));
    assert_eq!(eval("SUM(scores)", context.clone()), Value::Number(18.0));
    assert_eq!(eval("AVG(scores)", context), Value::Number(6.0));
    assert_eq!(eval("ROUND(2.567, 2)", json!({})), Value::Number(2.57));
    assert_eq!(eval("ROUND(2.5)", json!({})), Value::Number(3.0));
    assert_eq!(eval("ABS(-4)", json!({})), Value::Number(4.0));
    assert_eq!(eval(r#"YEAR("2024-03-15")"#, json!({})), Value::Number(2024.0));
    assert_eq!(eval(r#"MONTH(d) + DAY(d)"#, json!({ "d": "2024-03-15" })), Value::Number(18.0));
}

#[test]
fn test_pinned_clock() {
    let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
    let engine = ExpressionEngine::new().with_now(now);
    let context: HashMap<String, Value> = HashMap::new();
    assert_eq!(engine.evaluate("YEAR(TODAY())", &context).unwrap(), Value::Number(2026.0));
}

#[test]
fn test_date_arithmetic() {
    let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
    let engine = ExpressionEngine::new().with_now(now);
    let context: HashMap<String, Value> = HashMap::new();

    assert_eq!(
        engine.evaluate("TODAY() + 30", &context).unwrap(),
        Value::Date(NaiveDate::from_ymd_opt(2026, 11, 14).unwrap())
    );
    assert_eq!(
        engine.evaluate("TODAY() - 15", &context).unwrap(),
        Value::Date(NaiveDate::from_ymd_opt(2026, 9, 30).unwrap())
    );
    assert_eq!(
        engine.evaluate("(NOW() + 1.5) - NOW()", &context).unwrap(),
        Value::Number(1.5)
    );
}

#[test]
fn test_date_arithmetic_out_of_range_is_an_error() {
    let now = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
    let engine = ExpressionEngine::new().with_now(now);
    let mut context = HashMap::new();
    context.insert("days".to_string(), Value::Number(1e9));
    context.insert("huge".to_string(), Value::Number(1e12));

    let overflowing = [
        "TODAY() + days",
        "days + TODAY()",
        "TODAY() - days",
        "NOW() + huge",
        "NOW() - huge",
    ];
    for expression in overflowing {
        let err = engine.evaluate(expression, &context).unwrap_err();
        assert!(
            matches!(err, ExpressionError::Eval { source: EvalError::DateOutOfRange { .. }, .. }),
            "{}: {:?}",
            expression,
            err
        );
    }

    // Visibility falls back to its policy instead of aborting
    let conditions = vec![ConditionExpr::new("TODAY() + days", Operator::GreaterThan, 1)];
    assert!(engine.is_visible(&conditions, &context));
}

#[test]
fn test_parse_error_names_offending_text() {
    let err = evaluate("amount >", &ctx(json!({}))).unwrap_err();
    match err {
        ExpressionError::Parse { expression, .. } => assert_eq!(expression, "amount >"),
        other => panic!("expected parse error, got {:?}", other),
    }

    let err = evaluate("FOO(1)", &ctx(json!({}))).unwrap_err();
    assert!(matches!(
        err,
        ExpressionError::Parse { source: ParseError::UnknownFunction { .. }, .. }
    ));
}

#[test]
fn test_eval_error_names_subexpression() {
    let err = evaluate("1 + (a / 0)", &ctx(json!({ "a": 4 }))).unwrap_err();
    match err {
        ExpressionError::Eval { snippet, .. } => assert_eq!(snippet, "a / 0"),
        other => panic!("expected eval error, got {:?}", other),
    }
}

#[test]
fn test_function_names_are_case_sensitive() {
    assert!(evaluate("len(\"a\")", &ctx(json!({}))).is_err());
}

#[test]
fn test_validate_and_field_references() {
    let engine = ExpressionEngine::new();
    assert!(engine.validate("a && b").is_valid);
    let invalid = engine.validate("a &&");
    assert!(!invalid.is_valid);
    assert!(invalid.error.is_some());

    assert_eq!(
        engine
            .field_references(r#"IF(stage == "Won", amount, amount * probability) > floor"#)
            .unwrap(),
        vec!["stage", "amount", "probability", "floor"]
    );
}

#[test]
fn test_ast_cache_reuse() {
    let engine = ExpressionEngine::new();
    let first = engine.parse("a + 1").unwrap();
    let second = engine.parse("  a + 1  ").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(engine.cached_len(), 1);
    engine.clear_cache();
    assert_eq!(engine.cached_len(), 0);
}

#[test]
fn test_cache_capacity_limits_entries_not_results() {
    let engine = ExpressionEngine::with_config(ExpressionConfig {
        cache_capacity: Some(1),
        ..ExpressionConfig::default()
    });
    let context = ctx(json!({ "a": 1 }));
    assert_eq!(engine.evaluate("a + 1", &context).unwrap(), Value::Number(2.0));
    assert_eq!(engine.evaluate("a + 2", &context).unwrap(), Value::Number(3.0));
    assert_eq!(engine.cached_len(), 1);
}

#[test]
fn test_concurrent_evaluation_shares_cache() {
    let engine = Arc::new(ExpressionEngine::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut context = HashMap::new();
                context.insert("n".to_string(), Value::Number(i as f64));
                engine.evaluate("n * 2", &context).unwrap()
            })
        })
        .collect();
    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, value) in results.into_iter().enumerate() {
        assert_eq!(value, Value::Number(i as f64 * 2.0));
    }
    assert_eq!(engine.cached_len(), 1);
}

// ==================== Structured conditions ====================

#[test]
fn test_conditions_quote_strings_and_arrays() {
    let engine = ExpressionEngine::new();
    let conditions = vec![
        ConditionExpr::new("title", Operator::Equal, r#"He said "hi""#),
        ConditionExpr::new("stage", Operator::In, json!(["Won", "Lost"])),
    ];
    let context = ctx(json!({ "title": r#"He said "hi""#, "stage": "Lost" }));
    assert!(engine.evaluate_conditions(&conditions, &context).unwrap());
}

#[test]
fn test_visibility() {
    let engine = ExpressionEngine::new();
    let conditions = vec![ConditionExpr::new("status", Operator::Equal, "Active")];
    assert!(engine.is_visible(&conditions, &ctx(json!({ "status": "Active" }))));
    assert!(!engine.is_visible(&conditions, &ctx(json!({ "status": "Inactive" }))));
    assert!(engine.is_visible(&[], &ctx(json!({}))));
}

#[test]
fn test_visibility_fails_open_by_default() {
    let engine = ExpressionEngine::new();
    // Division by zero while evaluating the clause
    let conditions = vec![ConditionExpr::new("status", Operator::Equal, "Active")];
    let broken = vec![ConditionExpr::new("1 / 0", Operator::GreaterThan, 1)];
    assert!(engine.is_visible(&broken, &ctx(json!({}))));

    let strict = ExpressionEngine::with_config(ExpressionConfig {
        error_policy: ErrorPolicy::FailClosed,
        ..ExpressionConfig::default()
    });
    assert!(!strict.is_visible(&broken, &ctx(json!({}))));
    assert!(strict.is_visible(&conditions, &ctx(json!({ "status": "Active" }))));
}

#[test]
fn test_condition_json_shape() {
    let condition: ConditionExpr =
        serde_json::from_value(json!({ "left": "stage", "op": "STARTS_WITH", "right": "Closed" }))
            .unwrap();
    assert_eq!(condition.op, Operator::StartsWith);
    assert_eq!(condition.to_expression(), r#"stage STARTS_WITH "Closed""#);
}
