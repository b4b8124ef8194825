//! Create, update and delete records: validate, then persist

use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::{debug, info};

use crate::expr::ExpressionEngine;
use crate::layout::RecordLayoutRef;
use crate::record::store::{ConflictError, NewRecord, Record, RecordPatch, RecordStore, StoreError};
use crate::record::validator::{
    check_unique, merge_data, validate_and_normalize, validate_update, ValidationError,
    ValidationMode,
};
use crate::schema::{CustomObject, EntityKind, NotFoundError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record failed validation: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("Storage backend failed: {0}")]
    Backend(String),
}

impl From<StoreError> for RecordError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(e) => RecordError::NotFound(e),
            StoreError::Conflict(e) => RecordError::Conflict(e),
            StoreError::Backend(message) => RecordError::Backend(message),
        }
    }
}

impl RecordError {
    /// Per-field errors, empty for non-validation failures
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            RecordError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Runs payloads through the validator before handing them to a store.
///
/// The acting user's id is supplied by the caller and only stamped onto
/// the audit fields.
pub struct RecordService<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    engine: &'a ExpressionEngine,
}

impl<'a, S: RecordStore + ?Sized> RecordService<'a, S> {
    pub fn new(store: &'a S, engine: &'a ExpressionEngine) -> Self {
        Self { store, engine }
    }

    pub fn create(
        &self,
        object_api_name: &str,
        payload: &Map<String, Json>,
        layout: RecordLayoutRef,
        actor_id: &str,
    ) -> RecordResult<Record> {
        let object = self.store.find_object_by_api_name(object_api_name)?;

        if let Some(layout_id) = &layout.page_layout_id {
            let layouts = self.store.list_active_layouts_for_object(&object.id)?;
            if !layouts.iter().any(|l| &l.id == layout_id) {
                return Err(NotFoundError::layout(layout_id.clone()).into());
            }
        }
        if let Some(record_type_id) = &layout.record_type_id {
            if object.record_type(record_type_id).is_none() {
                return Err(NotFoundError::new(EntityKind::RecordType, record_type_id.clone()).into());
            }
        }

        let data = validate_and_normalize(&object, payload, ValidationMode::Create, self.engine)
            .map_err(RecordError::Validation)?;

        let existing = self.store.list_records(&object.id)?;
        let collisions = check_unique(&object, &data, existing.iter().map(|r| &r.data));
        if !collisions.is_empty() {
            debug!(object = object_api_name, "unique pre-check failed");
            return Err(RecordError::Validation(collisions));
        }

        let record = self.store.create_record(
            &object,
            NewRecord {
                data,
                page_layout_id: layout.page_layout_id,
                record_type_id: layout.record_type_id,
                actor_id: actor_id.to_string(),
            },
        )?;
        info!(object = object_api_name, record_id = %record.id, actor_id, "record created");
        Ok(record)
    }

    /// Partial update. `expected_version` enables optimistic concurrency.
    pub fn update(
        &self,
        record_id: &str,
        payload: &Map<String, Json>,
        expected_version: Option<u64>,
        actor_id: &str,
    ) -> RecordResult<Record> {
        let (object, current) = self.load(record_id)?;

        let data = validate_update(&object, &current.data, payload, self.engine)
            .map_err(RecordError::Validation)?;

        let others = self.store.list_records(&object.id)?;
        let merged = merge_data(&current.data, &data);
        let collisions = check_unique(
            &object,
            &merged,
            others.iter().filter(|r| r.id != record_id).map(|r| &r.data),
        );
        if !collisions.is_empty() {
            return Err(RecordError::Validation(collisions));
        }

        let record = self.store.update_record_merge(
            &object,
            record_id,
            RecordPatch {
                data,
                actor_id: actor_id.to_string(),
                expected_version,
            },
        )?;
        info!(record_id, version = record.version, actor_id, "record updated");
        Ok(record)
    }

    pub fn delete(&self, record_id: &str) -> RecordResult<()> {
        self.store.get_record(record_id)?;
        self.store.delete_record(record_id)?;
        info!(record_id, "record deleted");
        Ok(())
    }

    fn load(&self, record_id: &str) -> RecordResult<(CustomObject, Record)> {
        let record = self.store.get_record(record_id)?;
        let object = self.store.find_object_by_id(&record.object_id)?;
        Ok((object, record))
    }
}
