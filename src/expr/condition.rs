//! Structured visibility conditions, as stored on a field's `visibleIf`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operator of a single condition clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "INCLUDES")]
    Includes,
    #[serde(rename = "CONTAINS")]
    Contains,
    #[serde(rename = "STARTS_WITH")]
    StartsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::In => "IN",
            Operator::Includes => "INCLUDES",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One clause of a visibility rule: `left op right`, where `left` is a
/// field API name and `right` a literal or a list of literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionExpr {
    pub left: String,
    pub op: Operator,
    pub right: serde_json::Value,
}

impl ConditionExpr {
    pub fn new(left: impl Into<String>, op: Operator, right: impl Into<serde_json::Value>) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// Render the clause in expression syntax. String literals are quoted
    /// and escaped, arrays become `[...]` literals.
    pub fn to_expression(&self) -> String {
        format!("{} {} {}", self.left, self.op, literal(&self.right))
    }
}

/// AND-combine a list of clauses into one expression string. An empty list
/// yields `true`.
pub fn conditions_to_expression(conditions: &[ConditionExpr]) -> String {
    if conditions.is_empty() {
        return "true".to_string();
    }
    conditions
        .iter()
        .map(|condition| format!("({})", condition.to_expression()))
        .collect::<Vec<_>>()
        .join(" && ")
}

fn literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote(s),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", parts.join(", "))
        }
        // No object literal in the grammar; compare against its JSON text
        serde_json::Value::Object(_) => quote(&value.to_string()),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_right_hand_side_is_quoted() {
        let condition = ConditionExpr::new("status", Operator::Equal, "Active");
        assert_eq!(condition.to_expression(), r#"status == "Active""#);
    }

    #[test]
    fn test_embedded_quotes_are_escaped() {
        let condition = ConditionExpr::new("name", Operator::Contains, r#"say "hi""#);
        assert_eq!(condition.to_expression(), r#"name CONTAINS "say \"hi\"""#);
    }

    #[test]
    fn test_array_right_hand_side() {
        let condition = ConditionExpr::new("stage", Operator::In, json!(["Won", "Lost"]));
        assert_eq!(condition.to_expression(), r#"stage IN ["Won", "Lost"]"#);
    }

    #[test]
    fn test_numbers_are_not_quoted() {
        let condition = ConditionExpr::new("amount", Operator::GreaterThan, json!(1000));
        assert_eq!(condition.to_expression(), "amount > 1000");
    }

    #[test]
    fn test_conditions_are_and_combined() {
        let conditions = vec![
            ConditionExpr::new("a", Operator::Equal, 1),
            ConditionExpr::new("b", Operator::NotEqual, "x"),
        ];
        assert_eq!(
            conditions_to_expression(&conditions),
            r#"(a == 1) && (b != "x")"#
        );
        assert_eq!(conditions_to_expression(&[]), "true");
    }

    #[test]
    fn test_operator_serde_names() {
        let condition: ConditionExpr =
            serde_json::from_value(json!({"left": "status", "op": "==", "right": "Active"}))
                .unwrap();
        assert_eq!(condition.op, Operator::Equal);
    }
}
