//! Choosing the page layout for a record
//!
//! Resolution is a pure function of the record reference and the object:
//! nothing is cached, so a schema edit takes effect on the next call.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::schema::{CustomField, CustomObject, PageLayout};

/// The layout-relevant part of a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordLayoutRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_layout_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type_id: Option<String>,
}

impl RecordLayoutRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, page_layout_id: impl Into<String>) -> Self {
        self.page_layout_id = Some(page_layout_id.into());
        self
    }

    pub fn with_record_type(mut self, record_type_id: impl Into<String>) -> Self {
        self.record_type_id = Some(record_type_id.into());
        self
    }
}

/// Pick the layout for `record`. First match wins:
///
/// 1. the record's own `page_layout_id`, if it names an active layout
/// 2. the record's record type, else the object's first active record type
/// 3. that record type's layout, if active
/// 4. the object's first active layout
///
/// `None` means the object has no active layout.
pub fn resolve_layout<'o>(record: &RecordLayoutRef, object: &'o CustomObject) -> Option<&'o PageLayout> {
    if let Some(layout_id) = &record.page_layout_id {
        match object.layout(layout_id).filter(|l| l.is_active) {
            Some(layout) => {
                debug!(object = %object.api_name, layout = %layout.name, "layout from record");
                return Some(layout);
            }
            None => debug!(object = %object.api_name, layout_id, "record layout missing or inactive"),
        }
    }

    let record_type = record
        .record_type_id
        .as_deref()
        .and_then(|id| object.record_type(id))
        .or_else(|| object.record_types.iter().find(|rt| rt.is_active));

    if let Some(layout) = record_type
        .and_then(|rt| rt.page_layout_id.as_deref())
        .and_then(|id| object.layout(id))
        .filter(|l| l.is_active)
    {
        debug!(object = %object.api_name, layout = %layout.name, "layout from record type");
        return Some(layout);
    }

    let fallback = object.active_layouts().next();
    match fallback {
        Some(layout) => debug!(object = %object.api_name, layout = %layout.name, "first active layout"),
        None => debug!(object = %object.api_name, "no active layout"),
    }
    fallback
}

/// Active fields placed anywhere in `layout`, in object field order,
/// each at most once
pub fn fields_for_layout<'o>(object: &'o CustomObject, layout: &PageLayout) -> Vec<&'o CustomField> {
    let mut placed = HashSet::new();
    for layout_field in layout.placed_fields() {
        match object.field_by_reference(&layout_field.field_id) {
            Some(field) => {
                placed.insert(field.api_name.as_str());
            }
            None => warn!(
                object = %object.api_name,
                layout = %layout.name,
                field = %layout_field.field_id,
                "layout references unknown field"
            ),
        }
    }
    object
        .active_fields()
        .filter(|f| placed.contains(f.api_name.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, LayoutSection, LayoutTab, RecordType};

    fn object() -> CustomObject {
        let mut object = CustomObject::new("Deal", "Deal");
        for name in ["a", "b", "c"] {
            object
                .add_field(CustomField::new(name, name.to_uppercase(), FieldType::Text))
                .unwrap();
        }
        object
            .add_layout(PageLayout::new("first", "First").with_tab(
                LayoutTab::new("t", "T").with_section(
                    LayoutSection::new("s", "S", 1)
                        .with_field("c", 0, 0)
                        .with_field("a", 0, 1)
                        .with_field("Deal__c", 0, 2),
                ),
            ))
            .unwrap();
        object.add_layout(PageLayout::new("second", "Second")).unwrap();
        object
    }

    #[test]
    fn test_explicit_layout_wins() {
        let object = object();
        let record = RecordLayoutRef::new().with_layout("second");
        assert_eq!(resolve_layout(&record, &object).unwrap().id, "second");
    }

    #[test]
    fn test_inactive_explicit_layout_falls_through() {
        let mut object = object();
        object.deactivate_layout("second").unwrap();
        let record = RecordLayoutRef::new().with_layout("second");
        assert_eq!(resolve_layout(&record, &object).unwrap().id, "first");
    }

    #[test]
    fn test_record_type_layout() {
        let mut object = object();
        object
            .add_record_type(RecordType::new("rt1", "One").with_layout("first"))
            .unwrap();
        object
            .add_record_type(RecordType::new("rt2", "Two").with_layout("second"))
            .unwrap();
        let record = RecordLayoutRef::new().with_record_type("rt2");
        assert_eq!(resolve_layout(&record, &object).unwrap().id, "second");
        // Unknown record type: first record type
        let record = RecordLayoutRef::new().with_record_type("missing");
        assert_eq!(resolve_layout(&record, &object).unwrap().id, "first");
    }

    #[test]
    fn test_no_active_layout() {
        let mut object = object();
        object.deactivate_layout("first").unwrap();
        object.deactivate_layout("second").unwrap();
        assert!(resolve_layout(&RecordLayoutRef::new(), &object).is_none());
    }

    #[test]
    fn test_fields_in_object_order_deduplicated() {
        let object = object();
        let layout = object.layout("first").unwrap();
        let names: Vec<_> = fields_for_layout(&object, layout)
            .iter()
            .map(|f| f.api_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
