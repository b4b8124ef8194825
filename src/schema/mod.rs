//! Schema model: custom objects, their fields, page layouts and record types
//!
//! The graph is read-only at render time. End-user paths go through the
//! `active_*` accessors; inactive (soft-deleted) entities stay reachable
//! through the plain accessors for schema editing.

pub mod error;
pub mod field;
pub mod layout;
pub mod object;
pub mod snapshot;
pub mod standard_objects;

pub use error::{EntityKind, NotFoundError, SchemaError, SchemaResult};
pub use field::{is_valid_field_api_name, CustomField, FieldType, Relationship};
pub use layout::{LayoutField, LayoutSection, LayoutTab, LayoutType, PageLayout};
pub use object::{is_valid_object_api_name, Audit, CustomObject, RecordType, ValidationRule};
pub use snapshot::{SchemaLoadError, SchemaSnapshot};
pub use standard_objects::create_standard_schema;
