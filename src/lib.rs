pub mod config;
pub mod expr;
pub mod layout;
pub mod record;
pub mod render;
pub mod schema;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::{EngineConfig, ErrorPolicy, ExpressionConfig, RenderConfig};
pub use expr::{evaluate, parse, ConditionExpr, ExpressionEngine, ExpressionError, Operator, Value};
pub use layout::{fields_for_layout, resolve_layout, RecordLayoutRef};
pub use record::{
    validate_and_normalize, ErrorKind, MemoryStore, Record, RecordError, RecordService, RecordStore,
    ValidationError, ValidationMode,
};
pub use render::{RenderMode, RenderedView, Renderer};
pub use schema::{
    create_standard_schema, CustomField, CustomObject, FieldType, NotFoundError, PageLayout,
    SchemaError, SchemaSnapshot,
};
