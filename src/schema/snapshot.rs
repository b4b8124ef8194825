//! An immutable view of the schema, loaded once and passed to every call

use serde::{Deserialize, Serialize};

use crate::schema::error::{EntityKind, NotFoundError, SchemaError, SchemaResult};
use crate::schema::object::{is_valid_object_api_name, CustomObject};

/// All objects known to the application at one point in time.
///
/// Rendering and validation take a `&SchemaSnapshot` instead of reading a
/// shared store, so a schema edit only becomes visible once the caller
/// loads a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    objects: Vec<CustomObject>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot, re-checking every object's invariants
    pub fn from_objects(objects: Vec<CustomObject>) -> SchemaResult<Self> {
        let mut snapshot = Self::new();
        for object in objects {
            snapshot.add_object(object)?;
        }
        Ok(snapshot)
    }

    /// Parse a JSON snapshot and check it
    pub fn from_json(text: &str) -> Result<Self, SchemaLoadError> {
        let raw: SchemaSnapshot = serde_json::from_str(text)?;
        Ok(Self::from_objects(raw.objects)?)
    }

    pub fn add_object(&mut self, object: CustomObject) -> SchemaResult<()> {
        if !is_valid_object_api_name(&object.api_name) {
            return Err(SchemaError::InvalidObjectApiName(object.api_name));
        }
        if self
            .objects
            .iter()
            .any(|o| o.api_name == object.api_name || o.id == object.id)
        {
            return Err(SchemaError::Duplicate {
                kind: EntityKind::Object,
                identifier: object.api_name.clone(),
                object: object.api_name,
            });
        }
        object.validate()?;
        self.objects.push(object);
        Ok(())
    }

    /// Object by exact, case-sensitive API name, active or not
    pub fn object(&self, api_name: &str) -> Option<&CustomObject> {
        self.objects.iter().find(|o| o.api_name == api_name)
    }

    pub fn object_by_id(&self, id: &str) -> Option<&CustomObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Active object by API name, for end-user operations
    pub fn active_object(&self, api_name: &str) -> Result<&CustomObject, NotFoundError> {
        self.object(api_name)
            .filter(|o| o.is_active)
            .ok_or_else(|| NotFoundError::object(api_name))
    }

    /// Mutable access for administrative schema editing
    pub fn object_mut(&mut self, api_name: &str) -> Option<&mut CustomObject> {
        self.objects.iter_mut().find(|o| o.api_name == api_name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &CustomObject> {
        self.objects.iter()
    }

    pub fn active_objects(&self) -> impl Iterator<Item = &CustomObject> {
        self.objects.iter().filter(|o| o.is_active)
    }

    /// Soft-delete an object
    pub fn deactivate_object(&mut self, api_name: &str) -> Result<(), NotFoundError> {
        self.object_mut(api_name)
            .ok_or_else(|| NotFoundError::object(api_name))?
            .deactivate();
        Ok(())
    }
}

/// Failure loading a snapshot from JSON
#[derive(thiserror::Error, Debug)]
pub enum SchemaLoadError {
    #[error("Malformed schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_lookup_is_case_sensitive() {
        let snapshot = SchemaSnapshot::from_objects(vec![CustomObject::new("Deal", "Deal")]).unwrap();
        assert!(snapshot.object("Deal").is_some());
        assert!(snapshot.object("deal").is_none());
    }

    #[test]
    fn test_inactive_object_hidden_from_end_users() {
        let mut snapshot =
            SchemaSnapshot::from_objects(vec![CustomObject::new("Deal", "Deal")]).unwrap();
        snapshot.deactivate_object("Deal").unwrap();
        assert!(snapshot.object("Deal").is_some());
        assert_eq!(
            snapshot.active_object("Deal").unwrap_err(),
            NotFoundError::object("Deal")
        );
    }

    #[test]
    fn test_duplicate_and_invalid_objects() {
        let mut snapshot = SchemaSnapshot::new();
        snapshot.add_object(CustomObject::new("Deal", "Deal")).unwrap();
        assert!(matches!(
            snapshot.add_object(CustomObject::new("Deal", "Deal")),
            Err(SchemaError::Duplicate { .. })
        ));
        assert!(matches!(
            snapshot.add_object(CustomObject::new("deal2", "Deal")),
            Err(SchemaError::InvalidObjectApiName(_))
        ));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "objects": [{
                "id": "obj1",
                "apiName": "Deal",
                "label": "Deal",
                "pluralLabel": "Deals",
                "fields": [
                    { "id": "f1", "apiName": "dealName", "label": "Deal Name", "type": "Text", "required": true }
                ],
                "layouts": [{
                    "id": "l1",
                    "name": "Default Layout",
                    "tabs": [{ "id": "t1", "label": "Main", "sections": [
                        { "id": "s1", "label": "Info", "columns": 2, "fields": [ { "fieldId": "f1", "column": 0, "order": 0 } ] }
                    ]}]
                }]
            }]
        }"#;
        let snapshot = SchemaSnapshot::from_json(json).unwrap();
        let deal = snapshot.object("Deal").unwrap();
        assert!(deal.field("dealName").unwrap().required);
        assert!(deal.layouts[0].is_active);
    }

    #[test]
    fn test_from_json_rejects_foreign_layout_field() {
        let json = r#"{
            "objects": [{
                "id": "obj1", "apiName": "Deal", "label": "Deal", "pluralLabel": "Deals",
                "layouts": [{ "id": "l1", "name": "Bad", "tabs": [{ "id": "t1", "label": "Main", "sections": [
                    { "id": "s1", "label": "Info", "columns": 1, "fields": [ { "fieldId": "nope" } ] }
                ]}]}]
            }]
        }"#;
        assert!(matches!(
            SchemaSnapshot::from_json(json),
            Err(SchemaLoadError::Schema(SchemaError::ForeignField { .. }))
        ));
    }
}
