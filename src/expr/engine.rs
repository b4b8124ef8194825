//! Cached expression engine: the entry point used by visibility checks,
//! validation rules and formula fields.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ErrorPolicy, ExpressionConfig};
use crate::expr::ast::Expr;
use crate::expr::condition::{conditions_to_expression, ConditionExpr};
use crate::expr::eval::{Context, EvalError, Evaluator};
use crate::expr::parser::{self, ParseError};
use crate::expr::value::Value;

/// A parse or evaluation failure, carrying the full expression and the
/// offending sub-expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression '{expression}' near '{snippet}': {source}")]
    Parse {
        expression: String,
        snippet: String,
        source: ParseError,
    },
    #[error("Failed to evaluate '{snippet}' in expression '{expression}': {source}")]
    Eval {
        expression: String,
        snippet: String,
        source: EvalError,
    },
}

impl ExpressionError {
    fn parse(expression: &str, source: ParseError) -> Self {
        let snippet = source
            .span()
            .map(|span| span.snippet(expression).to_string())
            .filter(|snippet| !snippet.is_empty())
            .unwrap_or_else(|| expression.to_string());
        ExpressionError::Parse {
            expression: expression.to_string(),
            snippet,
            source,
        }
    }

    fn eval(expression: &str, source: EvalError) -> Self {
        ExpressionError::Eval {
            expression: expression.to_string(),
            snippet: source.span().snippet(expression).to_string(),
            source,
        }
    }
}

/// Outcome of `ExpressionEngine::validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parses, caches and evaluates expressions.
///
/// The engine is `Sync`: one instance is meant to be shared by every render
/// and validation running against the same schema. The AST cache is keyed
/// by the trimmed source text; two threads racing to fill the same key both
/// parse and the last insert wins, which is harmless because parsing is
/// deterministic.
#[derive(Debug, Default)]
pub struct ExpressionEngine {
    cache: RwLock<HashMap<String, Arc<Expr>>>,
    config: ExpressionConfig,
    now: Option<DateTime<Utc>>,
}

impl ExpressionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExpressionConfig) -> Self {
        Self {
            cache: RwLock::default(),
            config,
            now: None,
        }
    }

    /// Pin the clock used by NOW() and TODAY()
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn config(&self) -> &ExpressionConfig {
        &self.config
    }

    /// Parse `source`, reusing a cached AST when one exists
    pub fn parse(&self, source: &str) -> Result<Arc<Expr>, ExpressionError> {
        let key = source.trim();

        if let Some(expr) = self.read_cache().get(key) {
            debug!(expression = key, "expression cache hit");
            return Ok(Arc::clone(expr));
        }

        let expr = Arc::new(parser::parse(key).map_err(|e| ExpressionError::parse(key, e))?);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let full = self
            .config
            .cache_capacity
            .is_some_and(|capacity| cache.len() >= capacity);
        if full && !cache.contains_key(key) {
            debug!(expression = key, "expression cache full, not caching");
        } else {
            debug!(expression = key, "expression cache miss");
            cache.insert(key.to_string(), Arc::clone(&expr));
        }

        Ok(expr)
    }

    /// Parse (cached) and evaluate `source` against `context`
    pub fn evaluate<C: Context + ?Sized>(
        &self,
        source: &str,
        context: &C,
    ) -> Result<Value, ExpressionError> {
        let expr = self.parse(source)?;
        self.evaluate_parsed(source.trim(), &expr, context)
    }

    fn evaluate_parsed<C: Context + ?Sized>(
        &self,
        source: &str,
        expr: &Expr,
        context: &C,
    ) -> Result<Value, ExpressionError> {
        let mut evaluator = Evaluator::new(context);
        if let Some(now) = self.now {
            evaluator = evaluator.with_now(now);
        }
        evaluator
            .evaluate(expr)
            .map_err(|e| ExpressionError::eval(source, e))
    }

    /// Check that `source` parses, without evaluating it
    pub fn validate(&self, source: &str) -> ExpressionValidation {
        match self.parse(source) {
            Ok(_) => ExpressionValidation {
                is_valid: true,
                error: None,
            },
            Err(e) => ExpressionValidation {
                is_valid: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Field names referenced by `source`, in order of first appearance
    pub fn field_references(&self, source: &str) -> Result<Vec<String>, ExpressionError> {
        Ok(self.parse(source)?.field_references())
    }

    /// AND-combine structured conditions and evaluate them. An empty list is
    /// always true.
    pub fn evaluate_conditions<C: Context + ?Sized>(
        &self,
        conditions: &[ConditionExpr],
        context: &C,
    ) -> Result<bool, ExpressionError> {
        if conditions.is_empty() {
            return Ok(true);
        }
        let source = conditions_to_expression(conditions);
        Ok(self.evaluate(&source, context)?.is_truthy())
    }

    /// Visibility check for a field's `visibleIf` list. Errors resolve per
    /// the configured policy (visible under fail-open).
    pub fn is_visible<C: Context + ?Sized>(
        &self,
        conditions: &[ConditionExpr],
        context: &C,
    ) -> bool {
        match self.evaluate_conditions(conditions, context) {
            Ok(visible) => visible,
            Err(e) => {
                let visible = self.config.error_policy == ErrorPolicy::FailOpen;
                warn!(error = %e, visible, "visibility condition failed");
                visible
            }
        }
    }

    /// Whether a validation rule's error condition fires. Errors resolve per
    /// the configured policy (does not fire under fail-open).
    pub fn error_condition_met<C: Context + ?Sized>(&self, source: &str, context: &C) -> bool {
        match self.evaluate(source, context) {
            Ok(value) => value.is_truthy(),
            Err(e) => {
                let fires = self.config.error_policy == ErrorPolicy::FailClosed;
                warn!(error = %e, fires, "validation rule failed to evaluate");
                fires
            }
        }
    }

    pub fn cached_len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Expr>>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parse without caching
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    parser::parse(source.trim()).map_err(|e| ExpressionError::parse(source.trim(), e))
}

/// Parse and evaluate once, without caching
pub fn evaluate<C: Context + ?Sized>(source: &str, context: &C) -> Result<Value, ExpressionError> {
    let expr = parse(source)?;
    Evaluator::new(context)
        .evaluate(&expr)
        .map_err(|e| ExpressionError::eval(source.trim(), e))
}
