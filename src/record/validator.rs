//! Record validation and normalization
//!
//! Every problem found in a payload is collected; a caller gets either the
//! normalized data or the full list of per-field errors, never just the
//! first one.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::expr::ExpressionEngine;
use crate::record::normalize::{is_empty, normalize_value, record_context, unique_key};
use crate::schema::CustomObject;

/// Normalized record data keyed by field API name
pub type NormalizedData = Map<String, Json>;

/// Whether a payload creates a record or patches an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    Create,
    Update,
}

/// Why a field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Required,
    Unique,
    InvalidType,
    InvalidFormat,
    InvalidOption,
    TooShort,
    TooLong,
    OutOfRange,
    ReadOnly,
    UnknownField,
    /// An object validation rule fired
    Rule,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Required => "required",
            ErrorKind::Unique => "unique",
            ErrorKind::InvalidType => "invalid_type",
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::InvalidOption => "invalid_option",
            ErrorKind::TooShort => "too_short",
            ErrorKind::TooLong => "too_long",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::ReadOnly => "read_only",
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::Rule => "rule",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem with one field. `field` is empty for an object-level
/// validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub field: String,
    pub reason: ErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason,
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>, label: &str) -> Self {
        Self::new(field, ErrorKind::Required, format!("{} is required", label))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validate `payload` for `object` and return its normalized form.
///
/// On create, defaults fill absent keys and every active required field
/// must end up non-empty. On update only the keys present in the payload
/// are checked; use [`validate_update`] to also run validation rules
/// against the merged record.
pub fn validate_and_normalize(
    object: &CustomObject,
    payload: &Map<String, Json>,
    mode: ValidationMode,
    engine: &ExpressionEngine,
) -> Result<NormalizedData, Vec<ValidationError>> {
    let empty = Map::new();
    validate_against(object, &empty, payload, mode, engine)
}

/// Validate a partial update. Validation rules see `existing` with the
/// normalized patch merged over it.
pub fn validate_update(
    object: &CustomObject,
    existing: &Map<String, Json>,
    payload: &Map<String, Json>,
    engine: &ExpressionEngine,
) -> Result<NormalizedData, Vec<ValidationError>> {
    validate_against(object, existing, payload, ValidationMode::Update, engine)
}

fn validate_against(
    object: &CustomObject,
    existing: &Map<String, Json>,
    payload: &Map<String, Json>,
    mode: ValidationMode,
    engine: &ExpressionEngine,
) -> Result<NormalizedData, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut normalized = Map::new();

    // Canonical API names of the fields the payload touches
    let mut present = HashSet::new();

    for (key, raw) in payload {
        let Some(field) = object.field_by_reference(key).filter(|f| f.is_active) else {
            errors.push(ValidationError::new(
                key.as_str(),
                ErrorKind::UnknownField,
                format!("{} has no field named '{}'", object.label, key),
            ));
            continue;
        };
        present.insert(field.api_name.as_str());
        if field.is_read_only() {
            errors.push(ValidationError::new(
                field.api_name.as_str(),
                ErrorKind::ReadOnly,
                format!("{} is read-only", field.label),
            ));
            continue;
        }
        match normalize_value(field, raw) {
            Ok(value) => {
                normalized.insert(field.api_name.clone(), value);
            }
            Err(e) => errors.push(e),
        }
    }

    if mode == ValidationMode::Create {
        for field in object.active_fields() {
            if present.contains(field.api_name.as_str()) {
                continue;
            }
            if let Some(default) = &field.default_value {
                match normalize_value(field, default) {
                    Ok(value) => {
                        normalized.insert(field.api_name.clone(), value);
                    }
                    Err(e) => errors.push(e),
                }
            }
        }
    }

    // Required fields, in object field order
    for field in object.active_fields() {
        if !field.required || field.is_read_only() {
            continue;
        }
        if mode == ValidationMode::Update && !present.contains(field.api_name.as_str()) {
            continue;
        }
        if errors.iter().any(|e| e.field == field.api_name) {
            continue;
        }
        if normalized.get(&field.api_name).map_or(true, is_empty) {
            errors.push(ValidationError::required(field.api_name.as_str(), &field.label));
        }
    }

    let merged = merge_data(existing, &normalized);
    let context = record_context(object, &merged);
    for rule in object.active_validation_rules() {
        if engine.error_condition_met(&rule.error_condition, &context) {
            errors.push(ValidationError::new(
                rule.field.clone().unwrap_or_default(),
                ErrorKind::Rule,
                rule.error_message.clone(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(normalized)
    } else {
        Err(errors)
    }
}

/// Shallow merge: keys in `patch` replace those in `existing`, all other
/// keys survive
pub fn merge_data(existing: &Map<String, Json>, patch: &Map<String, Json>) -> Map<String, Json> {
    let mut merged = existing.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Pre-check `unique` fields of `candidate` against other records' data.
/// `others` should exclude the record being updated. The store repeats
/// this check atomically at write time.
pub fn check_unique<'r, I>(
    object: &CustomObject,
    candidate: &Map<String, Json>,
    others: I,
) -> Vec<ValidationError>
where
    I: IntoIterator<Item = &'r Map<String, Json>>,
{
    let unique_fields: Vec<_> = object
        .active_fields()
        .filter(|f| f.unique)
        .filter_map(|f| Some((f, unique_key(f, candidate.get(&f.api_name)?)?)))
        .collect();
    if unique_fields.is_empty() {
        return Vec::new();
    }

    let mut errors = Vec::new();
    let others: Vec<_> = others.into_iter().collect();
    for (field, key) in unique_fields {
        let taken = others.iter().any(|data| {
            data.get(&field.api_name)
                .and_then(|value| unique_key(field, value))
                .is_some_and(|other| other == key)
        });
        if taken {
            errors.push(ValidationError::new(
                field.api_name.as_str(),
                ErrorKind::Unique,
                format!("Another {} already has this {}", object.label, field.label),
            ));
        }
    }
    errors
}
