//! Persistence tests for the in-memory store: merge-on-update, optimistic
//! versions, and uniqueness enforced at write time

use std::sync::Arc;
use std::thread;

use crmrust::expr::ExpressionEngine;
use crmrust::layout::RecordLayoutRef;
use crmrust::record::{
    ConflictError, MemoryStore, NewRecord, RecordError, RecordPatch, RecordService, RecordStore,
    StoreError,
};
use crmrust::schema::{CustomField, CustomObject, FieldType, NotFoundError, SchemaSnapshot};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value as Json};

fn payload(value: Json) -> Map<String, Json> {
    value.as_object().cloned().unwrap()
}

fn item_schema() -> SchemaSnapshot {
    let mut item = CustomObject::new("Item", "Item");
    item.add_field(CustomField::new("a", "A", FieldType::Number)).unwrap();
    item.add_field(CustomField::new("b", "B", FieldType::Number)).unwrap();
    item.add_field(CustomField::new("code", "Code", FieldType::Text).unique())
        .unwrap();
    SchemaSnapshot::from_objects(vec![item]).unwrap()
}

fn new_record(data: Json) -> NewRecord {
    NewRecord {
        data: payload(data),
        actor_id: "tester".to_string(),
        ..NewRecord::default()
    }
}

#[test]
fn test_partial_update_keeps_untouched_keys() {
    let store = MemoryStore::new(item_schema());
    let engine = ExpressionEngine::new();
    let service = RecordService::new(&store, &engine);

    let record = service
        .create("Item", &payload(json!({ "a": 0, "b": 2 })), RecordLayoutRef::new(), "u")
        .unwrap();
    let updated = service
        .update(&record.id, &payload(json!({ "a": 1 })), None, "u")
        .unwrap();

    assert_eq!(updated.data, payload(json!({ "a": 1, "b": 2 })));
    assert_eq!(store.get_record(&record.id).unwrap().data, updated.data);
}

#[test]
fn test_versions_and_audit() {
    let store = MemoryStore::new(item_schema());
    let item = store.find_object_by_api_name("Item").unwrap();

    let created = store
        .create_record(&item, new_record(json!({ "a": 1 })))
        .unwrap();
    assert_eq!(created.version, 1);
    assert_eq!(created.record_number, 1);
    assert_eq!(created.audit.created_by_id.as_deref(), Some("tester"));

    let updated = store
        .update_record_merge(
            &item,
            &created.id,
            RecordPatch {
                data: payload(json!({ "b": 5 })),
                actor_id: "editor".to_string(),
                expected_version: Some(1),
            },
        )
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.audit.modified_by_id.as_deref(), Some("editor"));
    assert_eq!(updated.audit.created_by_id.as_deref(), Some("tester"));

    let second = store.create_record(&item, new_record(json!({}))).unwrap();
    assert_eq!(second.record_number, 2);
    assert_ne!(second.id, created.id);
}

#[test]
fn test_stale_version_is_rejected() {
    let store = MemoryStore::new(item_schema());
    let engine = ExpressionEngine::new();
    let service = RecordService::new(&store, &engine);

    let record = service
        .create("Item", &payload(json!({ "a": 1 })), RecordLayoutRef::new(), "u")
        .unwrap();
    service
        .update(&record.id, &payload(json!({ "a": 2 })), Some(1), "u")
        .unwrap();

    let err = service
        .update(&record.id, &payload(json!({ "a": 3 })), Some(1), "u")
        .unwrap_err();
    assert_eq!(
        err,
        RecordError::Conflict(ConflictError::StaleVersion {
            record_id: record.id.clone(),
            expected: 1,
            actual: 2,
        })
    );
    assert_eq!(store.get_record(&record.id).unwrap().data["a"], json!(2));
}

#[test]
fn test_store_enforces_uniqueness_without_service() {
    let store = MemoryStore::new(item_schema());
    let item = store.find_object_by_api_name("Item").unwrap();

    store
        .create_record(&item, new_record(json!({ "code": "X-1" })))
        .unwrap();
    let err = store
        .create_record(&item, new_record(json!({ "code": "X-1" })))
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::Conflict(ConflictError::UniqueViolation {
            object: "Item".to_string(),
            field: "code".to_string(),
            value: "x-1".to_string(),
        })
    );

    // Text compares trimmed and without case
    let err = store
        .create_record(&item, new_record(json!({ "code": " x-1 " })))
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ConflictError::UniqueViolation { .. })));

    // Empty values never collide
    store.create_record(&item, new_record(json!({}))).unwrap();
    store.create_record(&item, new_record(json!({}))).unwrap();
    assert_eq!(store.list_records(&item.id).unwrap().len(), 3);
}

#[test]
fn test_update_may_keep_its_own_unique_value() {
    let store = MemoryStore::new(item_schema());
    let engine = ExpressionEngine::new();
    let service = RecordService::new(&store, &engine);

    let first = service
        .create("Item", &payload(json!({ "code": "A" })), RecordLayoutRef::new(), "u")
        .unwrap();
    let second = service
        .create("Item", &payload(json!({ "code": "B" })), RecordLayoutRef::new(), "u")
        .unwrap();

    service
        .update(&first.id, &payload(json!({ "code": "A", "a": 4 })), None, "u")
        .unwrap();
    let err = service
        .update(&second.id, &payload(json!({ "code": "A" })), None, "u")
        .unwrap_err();
    assert_eq!(err.validation_errors().len(), 1);
    assert_eq!(err.validation_errors()[0].field, "code");
}

#[test]
fn test_concurrent_creates_with_same_unique_value() {
    let store = Arc::new(MemoryStore::new(item_schema()));
    let item = store.find_object_by_api_name("Item").unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let item = item.clone();
            thread::spawn(move || store.create_record(&item, new_record(json!({ "code": "SAME" }))))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, StoreError::Conflict(ConflictError::UniqueViolation { .. }))));
    assert_eq!(store.list_records(&item.id).unwrap().len(), 1);
}

#[test]
fn test_delete_is_hard() {
    let store = MemoryStore::new(item_schema());
    let engine = ExpressionEngine::new();
    let service = RecordService::new(&store, &engine);

    let record = service
        .create("Item", &payload(json!({ "code": "Z" })), RecordLayoutRef::new(), "u")
        .unwrap();
    service.delete(&record.id).unwrap();

    assert_eq!(
        store.get_record(&record.id).unwrap_err(),
        StoreError::NotFound(NotFoundError::record(record.id.clone()))
    );
    assert!(matches!(service.delete(&record.id), Err(RecordError::NotFound(_))));

    // The unique value is free again
    service
        .create("Item", &payload(json!({ "code": "Z" })), RecordLayoutRef::new(), "u")
        .unwrap();
}

#[test]
fn test_schema_lookups() {
    let mut schema = item_schema();
    schema
        .object_mut("Item")
        .unwrap()
        .deactivate_field("b")
        .unwrap();
    let store = MemoryStore::new(schema);

    let item = store.find_object_by_api_name("Item").unwrap();
    assert_eq!(store.find_object_by_id(&item.id).unwrap().api_name, "Item");
    let fields: Vec<String> = store
        .list_active_fields_for_object(&item.id)
        .unwrap()
        .into_iter()
        .map(|f| f.api_name)
        .collect();
    assert_eq!(fields, vec!["a", "code"]);
    assert!(store.list_active_layouts_for_object(&item.id).unwrap().is_empty());

    assert!(matches!(
        store.find_object_by_api_name("item"),
        Err(StoreError::NotFound(_))
    ));
}
