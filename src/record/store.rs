//! Persistence boundary for records and schema lookups

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::info;

use crate::layout::RecordLayoutRef;
use crate::record::normalize::unique_key;
use crate::record::validator::merge_data;
use crate::render::lookup::LookupSource;
use crate::schema::{Audit, CustomField, CustomObject, NotFoundError, PageLayout, SchemaSnapshot};

/// A stored instance of a custom object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub object_id: String,
    pub data: Map<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_layout_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type_id: Option<String>,
    /// Per-object sequence number assigned by the store
    #[serde(default)]
    pub record_number: u64,
    /// Incremented on every update
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub audit: Audit,
}

impl Record {
    pub fn layout_ref(&self) -> RecordLayoutRef {
        RecordLayoutRef {
            page_layout_id: self.page_layout_id.clone(),
            record_type_id: self.record_type_id.clone(),
        }
    }
}

/// Input for creating a record; data is already normalized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecord {
    pub data: Map<String, Json>,
    pub page_layout_id: Option<String>,
    pub record_type_id: Option<String>,
    pub actor_id: String,
}

/// A normalized partial update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub data: Map<String, Json>,
    pub actor_id: String,
    /// Reject the write unless the stored version still matches
    pub expected_version: Option<u64>,
}

/// A write lost a race with another writer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Value '{value}' of '{field}' is already used by another {object} record")]
    UniqueViolation {
        object: String,
        field: String,
        value: String,
    },
    #[error("Record '{record_id}' was modified concurrently (expected version {expected}, found {actual})")]
    StaleVersion {
        record_id: String,
        expected: u64,
        actual: u64,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("Storage backend failed: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What the core needs from persistence. Implementations must enforce
/// uniqueness of `unique` fields atomically with the write.
pub trait RecordStore: Send + Sync {
    /// Active object by exact API name
    fn find_object_by_api_name(&self, api_name: &str) -> StoreResult<CustomObject>;

    /// Active object by id, for records that only carry `object_id`
    fn find_object_by_id(&self, object_id: &str) -> StoreResult<CustomObject>;

    fn list_active_fields_for_object(&self, object_id: &str) -> StoreResult<Vec<CustomField>>;

    fn list_active_layouts_for_object(&self, object_id: &str) -> StoreResult<Vec<PageLayout>>;

    fn create_record(&self, object: &CustomObject, record: NewRecord) -> StoreResult<Record>;

    /// Merge `patch.data` over the stored data; untouched keys survive
    fn update_record_merge(
        &self,
        object: &CustomObject,
        record_id: &str,
        patch: RecordPatch,
    ) -> StoreResult<Record>;

    /// Hard delete
    fn delete_record(&self, record_id: &str) -> StoreResult<()>;

    fn get_record(&self, record_id: &str) -> StoreResult<Record>;

    fn list_records(&self, object_id: &str) -> StoreResult<Vec<Record>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<String, Record>,
    /// Insertion order of record ids
    order: Vec<String>,
    /// Last record number handed out per object id
    sequences: HashMap<String, u64>,
    next_id: u64,
}

/// In-process store backed by a schema snapshot and a locked map
#[derive(Debug, Default)]
pub struct MemoryStore {
    schema: SchemaSnapshot,
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new(schema: SchemaSnapshot) -> Self {
        Self {
            schema,
            state: RwLock::default(),
        }
    }

    pub fn schema(&self) -> &SchemaSnapshot {
        &self.schema
    }

    fn object_by_id(&self, object_id: &str) -> StoreResult<&CustomObject> {
        self.schema
            .object_by_id(object_id)
            .filter(|o| o.is_active)
            .ok_or_else(|| NotFoundError::object(object_id).into())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fail if any unique field of `data` collides with another record of the
/// same object
fn enforce_unique(
    state: &MemoryState,
    object: &CustomObject,
    data: &Map<String, Json>,
    exclude_id: Option<&str>,
) -> Result<(), ConflictError> {
    for field in object.active_fields().filter(|f| f.unique) {
        let Some(key) = data.get(&field.api_name).and_then(|v| unique_key(field, v)) else {
            continue;
        };
        let collides = state
            .records
            .values()
            .filter(|r| r.object_id == object.id && Some(r.id.as_str()) != exclude_id)
            .any(|r| {
                r.data
                    .get(&field.api_name)
                    .and_then(|v| unique_key(field, v))
                    .is_some_and(|other| other == key)
            });
        if collides {
            return Err(ConflictError::UniqueViolation {
                object: object.api_name.clone(),
                field: field.api_name.clone(),
                value: key,
            });
        }
    }
    Ok(())
}

impl RecordStore for MemoryStore {
    fn find_object_by_api_name(&self, api_name: &str) -> StoreResult<CustomObject> {
        Ok(self.schema.active_object(api_name)?.clone())
    }

    fn find_object_by_id(&self, object_id: &str) -> StoreResult<CustomObject> {
        Ok(self.object_by_id(object_id)?.clone())
    }

    fn list_active_fields_for_object(&self, object_id: &str) -> StoreResult<Vec<CustomField>> {
        Ok(self.object_by_id(object_id)?.active_fields().cloned().collect())
    }

    fn list_active_layouts_for_object(&self, object_id: &str) -> StoreResult<Vec<PageLayout>> {
        Ok(self.object_by_id(object_id)?.active_layouts().cloned().collect())
    }

    fn create_record(&self, object: &CustomObject, record: NewRecord) -> StoreResult<Record> {
        let mut state = self.write();
        enforce_unique(&state, object, &record.data, None)?;

        state.next_id += 1;
        let id = format!("{}-{:06}", object.api_name.to_lowercase(), state.next_id);
        let sequence = state.sequences.entry(object.id.clone()).or_insert(0);
        *sequence += 1;
        let record_number = *sequence;

        let record = Record {
            id: id.clone(),
            object_id: object.id.clone(),
            data: record.data,
            page_layout_id: record.page_layout_id,
            record_type_id: record.record_type_id,
            record_number,
            version: 1,
            audit: Audit::created(&record.actor_id, Utc::now()),
        };
        state.records.insert(id.clone(), record.clone());
        state.order.push(id);

        info!(object = %object.api_name, record_id = %record.id, "created record");
        Ok(record)
    }

    fn update_record_merge(
        &self,
        object: &CustomObject,
        record_id: &str,
        patch: RecordPatch,
    ) -> StoreResult<Record> {
        let mut state = self.write();
        let current = state
            .records
            .get(record_id)
            .filter(|r| r.object_id == object.id)
            .ok_or_else(|| NotFoundError::record(record_id))?;

        if let Some(expected) = patch.expected_version {
            if expected != current.version {
                return Err(ConflictError::StaleVersion {
                    record_id: record_id.to_string(),
                    expected,
                    actual: current.version,
                }
                .into());
            }
        }

        let merged = merge_data(&current.data, &patch.data);
        enforce_unique(&state, object, &merged, Some(record_id))?;

        let record = state
            .records
            .get_mut(record_id)
            .ok_or_else(|| NotFoundError::record(record_id))?;
        record.data = merged;
        record.version += 1;
        record.audit.touch(&patch.actor_id, Utc::now());

        info!(object = %object.api_name, record_id, version = record.version, "updated record");
        Ok(record.clone())
    }

    fn delete_record(&self, record_id: &str) -> StoreResult<()> {
        let mut state = self.write();
        state
            .records
            .remove(record_id)
            .ok_or_else(|| NotFoundError::record(record_id))?;
        state.order.retain(|id| id != record_id);
        info!(record_id, "deleted record");
        Ok(())
    }

    fn get_record(&self, record_id: &str) -> StoreResult<Record> {
        self.read()
            .records
            .get(record_id)
            .cloned()
            .ok_or_else(|| NotFoundError::record(record_id).into())
    }

    fn list_records(&self, object_id: &str) -> StoreResult<Vec<Record>> {
        let state = self.read();
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|r| r.object_id == object_id)
            .cloned()
            .collect())
    }
}

impl LookupSource for MemoryStore {
    fn find_related(&self, object_api_name: &str, record_id: &str) -> Option<Record> {
        let object = self.schema.object(object_api_name)?;
        self.read()
            .records
            .get(record_id)
            .filter(|r| r.object_id == object.id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn store() -> (MemoryStore, CustomObject) {
        let mut contact = CustomObject::new("Contact", "Contact");
        contact
            .add_field(CustomField::new("email", "Email", FieldType::Email).unique())
            .unwrap();
        contact
            .add_field(CustomField::new("name", "Name", FieldType::Text))
            .unwrap();
        let schema = SchemaSnapshot::from_objects(vec![contact.clone()]).unwrap();
        (MemoryStore::new(schema), contact)
    }

    fn data(value: Json) -> Map<String, Json> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_record_numbers_are_sequential_per_object() {
        let (store, contact) = store();
        let a = store.create_record(&contact, NewRecord::default()).unwrap();
        let b = store.create_record(&contact, NewRecord::default()).unwrap();
        assert_eq!((a.record_number, b.record_number), (1, 2));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_unique_violation_is_a_conflict() {
        let (store, contact) = store();
        let record = NewRecord {
            data: data(json!({ "email": "ada@example.com" })),
            ..NewRecord::default()
        };
        store.create_record(&contact, record.clone()).unwrap();
        let err = store.create_record(&contact, record).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ConflictError::UniqueViolation { .. })));
    }

    #[test]
    fn test_stale_version_rejected() {
        let (store, contact) = store();
        let created = store.create_record(&contact, NewRecord::default()).unwrap();
        let patch = RecordPatch {
            data: data(json!({ "name": "Ada" })),
            actor_id: "u1".into(),
            expected_version: Some(created.version),
        };
        let updated = store.update_record_merge(&contact, &created.id, patch.clone()).unwrap();
        assert_eq!(updated.version, 2);
        let err = store.update_record_merge(&contact, &created.id, patch).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict(ConflictError::StaleVersion { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_hard_delete() {
        let (store, contact) = store();
        let created = store.create_record(&contact, NewRecord::default()).unwrap();
        store.delete_record(&created.id).unwrap();
        assert!(matches!(store.get_record(&created.id), Err(StoreError::NotFound(_))));
        assert!(store.list_records(&contact.id).unwrap().is_empty());
    }
}
