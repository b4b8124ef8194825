//! Error types for schema construction and lookup

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which kind of schema entity a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Object,
    Field,
    Layout,
    RecordType,
    Record,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Object => "object",
            EntityKind::Field => "field",
            EntityKind::Layout => "layout",
            EntityKind::RecordType => "record type",
            EntityKind::Record => "record",
        };
        f.write_str(name)
    }
}

/// A referenced schema entity (or record) does not exist
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Unknown {kind}: {identifier}")]
pub struct NotFoundError {
    pub kind: EntityKind,
    pub identifier: String,
}

impl NotFoundError {
    pub fn new(kind: EntityKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
        }
    }

    pub fn object(identifier: impl Into<String>) -> Self {
        Self::new(EntityKind::Object, identifier)
    }

    pub fn field(identifier: impl Into<String>) -> Self {
        Self::new(EntityKind::Field, identifier)
    }

    pub fn layout(identifier: impl Into<String>) -> Self {
        Self::new(EntityKind::Layout, identifier)
    }

    pub fn record(identifier: impl Into<String>) -> Self {
        Self::new(EntityKind::Record, identifier)
    }
}

/// Errors raised while building or editing schema metadata
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Invalid object API name '{0}': must match [A-Z][A-Za-z0-9_]*")]
    InvalidObjectApiName(String),

    #[error("Invalid field API name '{0}': must match [a-zA-Z][a-zA-Z0-9_]*")]
    InvalidFieldApiName(String),

    #[error("Duplicate {kind} '{identifier}' on object '{object}'")]
    Duplicate {
        kind: EntityKind,
        identifier: String,
        object: String,
    },

    #[error("Section '{section}' has {columns} columns; only 1, 2 or 3 are allowed")]
    InvalidColumnCount { section: String, columns: u8 },

    #[error("Field '{field}' is placed in column {column} but section '{section}' has {columns} columns")]
    ColumnOutOfRange {
        section: String,
        field: String,
        column: u8,
        columns: u8,
    },

    #[error("Layout '{layout}' references field '{field}' which does not belong to object '{object}'")]
    ForeignField {
        layout: String,
        field: String,
        object: String,
    },

    #[error("Field '{field}' of type {field_type} requires {requirement}")]
    MissingConstraint {
        field: String,
        field_type: String,
        requirement: String,
    },

    #[error("Invalid expression on '{owner}': {message}")]
    InvalidExpression { owner: String, message: String },

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
