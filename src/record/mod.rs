//! Records: validation, normalization and the persistence boundary

pub mod normalize;
pub mod service;
pub mod store;
pub mod validator;

pub use normalize::{decode_picklist, encode_list, normalize_value, record_context, unique_key};
pub use service::{RecordError, RecordResult, RecordService};
pub use store::{
    ConflictError, MemoryStore, NewRecord, Record, RecordPatch, RecordStore, StoreError, StoreResult,
};
pub use validator::{
    check_unique, merge_data, validate_and_normalize, validate_update, ErrorKind, NormalizedData,
    ValidationError, ValidationMode,
};
