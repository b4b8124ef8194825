//! Custom objects and the metadata they own

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expr::condition::ConditionExpr;
use crate::expr::parser;
use crate::schema::error::{EntityKind, NotFoundError, SchemaError, SchemaResult};
use crate::schema::field::{is_valid_field_api_name, CustomField, FieldType};
use crate::schema::layout::PageLayout;

/// Who created and last modified an entity, and when
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl Audit {
    /// Audit block for a newly created entity
    pub fn created(actor_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            created_by_id: Some(actor_id.to_string()),
            modified_by_id: Some(actor_id.to_string()),
            created_at: Some(at),
            modified_at: Some(at),
        }
    }

    pub fn touch(&mut self, actor_id: &str, at: DateTime<Utc>) {
        self.modified_by_id = Some(actor_id.to_string());
        self.modified_at = Some(at);
    }
}

fn default_true() -> bool {
    true
}

/// A record type selects the layout used for its records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordType {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_layout_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl RecordType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            page_layout_id: None,
            is_active: true,
        }
    }

    pub fn with_layout(mut self, page_layout_id: impl Into<String>) -> Self {
        self.page_layout_id = Some(page_layout_id.into());
        self
    }
}

/// Object-level rule: the record is rejected when `error_condition`
/// evaluates truthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub name: String,
    pub error_condition: String,
    pub error_message: String,
    /// Field the error is reported against; object-level when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ValidationRule {
    pub fn new(
        name: impl Into<String>,
        error_condition: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            error_condition: error_condition.into(),
            error_message: error_message.into(),
            field: None,
            is_active: true,
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// An administrator-defined entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomObject {
    pub id: String,
    pub api_name: String,
    pub label: String,
    pub plural_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub audit: Audit,
    #[serde(default)]
    pub fields: Vec<CustomField>,
    #[serde(default)]
    pub layouts: Vec<PageLayout>,
    #[serde(default)]
    pub record_types: Vec<RecordType>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
}

impl CustomObject {
    /// Create an empty object. The id defaults to the API name.
    pub fn new(api_name: impl Into<String>, label: impl Into<String>) -> Self {
        let api_name = api_name.into();
        let label = label.into();
        Self {
            id: api_name.clone(),
            plural_label: format!("{}s", label),
            api_name,
            label,
            description: None,
            is_active: true,
            audit: Audit::default(),
            fields: Vec::new(),
            layouts: Vec::new(),
            record_types: Vec::new(),
            validation_rules: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_plural_label(mut self, plural_label: impl Into<String>) -> Self {
        self.plural_label = plural_label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    // ==================== Editing ====================

    /// Attach a field, checking its API name, uniqueness within the object
    /// and type-specific requirements
    pub fn add_field(&mut self, mut field: CustomField) -> SchemaResult<()> {
        self.check_field(&field)?;
        if self
            .fields
            .iter()
            .any(|f| f.api_name == field.api_name || f.id == field.id)
        {
            return Err(SchemaError::Duplicate {
                kind: EntityKind::Field,
                identifier: field.api_name,
                object: self.api_name.clone(),
            });
        }
        field.object_id = self.id.clone();
        if let Some(relationship) = field.relationship.as_mut() {
            relationship.child_object = self.api_name.clone();
        }
        self.fields.push(field);
        Ok(())
    }

    /// Attach a layout. Fails if any placement references a field of
    /// another object or sits outside its section's columns.
    pub fn add_layout(&mut self, mut layout: PageLayout) -> SchemaResult<()> {
        self.check_layout(&layout)?;
        if self.layouts.iter().any(|l| l.id == layout.id) {
            return Err(SchemaError::Duplicate {
                kind: EntityKind::Layout,
                identifier: layout.id,
                object: self.api_name.clone(),
            });
        }
        layout.object_id = self.id.clone();
        self.layouts.push(layout);
        Ok(())
    }

    pub fn add_record_type(&mut self, record_type: RecordType) -> SchemaResult<()> {
        self.check_record_type(&record_type)?;
        if self.record_types.iter().any(|rt| rt.id == record_type.id) {
            return Err(SchemaError::Duplicate {
                kind: EntityKind::RecordType,
                identifier: record_type.id,
                object: self.api_name.clone(),
            });
        }
        self.record_types.push(record_type);
        Ok(())
    }

    pub fn add_validation_rule(&mut self, rule: ValidationRule) -> SchemaResult<()> {
        check_expression(&rule.name, &rule.error_condition)?;
        self.validation_rules.push(rule);
        Ok(())
    }

    /// Soft-delete the object
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Soft-delete a field; it stays visible to schema editing
    pub fn deactivate_field(&mut self, api_name: &str) -> Result<(), NotFoundError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.api_name == api_name)
            .ok_or_else(|| NotFoundError::field(api_name))?;
        field.is_active = false;
        Ok(())
    }

    /// Soft-delete a layout
    pub fn deactivate_layout(&mut self, layout_id: &str) -> Result<(), NotFoundError> {
        let layout = self
            .layouts
            .iter_mut()
            .find(|l| l.id == layout_id)
            .ok_or_else(|| NotFoundError::layout(layout_id))?;
        layout.is_active = false;
        Ok(())
    }

    // ==================== Validation ====================

    /// Re-check every invariant, e.g. after deserializing
    pub fn validate(&self) -> SchemaResult<()> {
        if !is_valid_object_api_name(&self.api_name) {
            return Err(SchemaError::InvalidObjectApiName(self.api_name.clone()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            self.check_field(field)?;
            if !seen.insert(field.api_name.as_str()) {
                return Err(SchemaError::Duplicate {
                    kind: EntityKind::Field,
                    identifier: field.api_name.clone(),
                    object: self.api_name.clone(),
                });
            }
        }
        for layout in &self.layouts {
            self.check_layout(layout)?;
        }
        for record_type in &self.record_types {
            self.check_record_type(record_type)?;
        }
        for rule in &self.validation_rules {
            check_expression(&rule.name, &rule.error_condition)?;
        }
        Ok(())
    }

    fn check_field(&self, field: &CustomField) -> SchemaResult<()> {
        if !is_valid_field_api_name(&field.api_name) {
            return Err(SchemaError::InvalidFieldApiName(field.api_name.clone()));
        }
        if field.field_type.is_reference() && field.relationship.is_none() {
            return Err(SchemaError::MissingConstraint {
                field: field.api_name.clone(),
                field_type: field.field_type.to_string(),
                requirement: "a relationship to a lookup object".to_string(),
            });
        }
        if let Some(formula) = &field.formula {
            check_expression(&field.api_name, formula)?;
        } else if field.field_type == FieldType::Formula {
            return Err(SchemaError::MissingConstraint {
                field: field.api_name.clone(),
                field_type: field.field_type.to_string(),
                requirement: "a formula expression".to_string(),
            });
        }
        Ok(())
    }

    fn check_layout(&self, layout: &PageLayout) -> SchemaResult<()> {
        for section in layout.sections() {
            if !(1..=3).contains(&section.columns) {
                return Err(SchemaError::InvalidColumnCount {
                    section: section.label.clone(),
                    columns: section.columns,
                });
            }
            for placed in &section.fields {
                if self.field_by_reference(&placed.field_id).is_none() {
                    return Err(SchemaError::ForeignField {
                        layout: layout.name.clone(),
                        field: placed.field_id.clone(),
                        object: self.api_name.clone(),
                    });
                }
                if placed.column >= section.columns {
                    return Err(SchemaError::ColumnOutOfRange {
                        section: section.label.clone(),
                        field: placed.field_id.clone(),
                        column: placed.column,
                        columns: section.columns,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_record_type(&self, record_type: &RecordType) -> SchemaResult<()> {
        match &record_type.page_layout_id {
            Some(layout_id) if self.layout(layout_id).is_none() => {
                Err(NotFoundError::layout(layout_id.clone()).into())
            }
            _ => Ok(()),
        }
    }

    // ==================== Lookup ====================

    /// Field by exact API name, active or not
    pub fn field(&self, api_name: &str) -> Option<&CustomField> {
        self.fields.iter().find(|f| f.api_name == api_name)
    }

    pub fn field_by_id(&self, id: &str) -> Option<&CustomField> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Resolve a stored field reference: an id, an API name, or an API name
    /// carrying this object's legacy `<Object>__` prefix such as
    /// `Account__name`
    pub fn field_by_reference(&self, reference: &str) -> Option<&CustomField> {
        self.field_by_id(reference)
            .or_else(|| self.field(reference))
            .or_else(|| self.field(self.strip_object_prefix(reference)?))
    }

    /// Conditions with each `left` that names one of this object's fields
    /// rewritten to that field's API name. Other clauses pass through.
    pub fn canonical_conditions(&self, conditions: &[ConditionExpr]) -> Vec<ConditionExpr> {
        conditions
            .iter()
            .map(|condition| match self.field_by_reference(&condition.left) {
                Some(field) if field.api_name != condition.left => ConditionExpr {
                    left: field.api_name.clone(),
                    ..condition.clone()
                },
                _ => condition.clone(),
            })
            .collect()
    }

    /// Drop a leading `<Object>__` naming this object
    pub fn strip_object_prefix<'r>(&self, reference: &'r str) -> Option<&'r str> {
        reference
            .strip_prefix(self.api_name.as_str())
            .and_then(|rest| rest.strip_prefix("__"))
            .filter(|rest| !rest.is_empty())
    }

    /// Active fields in stored order
    pub fn active_fields(&self) -> impl Iterator<Item = &CustomField> {
        self.fields.iter().filter(|f| f.is_active)
    }

    pub fn active_field(&self, api_name: &str) -> Option<&CustomField> {
        self.field(api_name).filter(|f| f.is_active)
    }

    pub fn layout(&self, id: &str) -> Option<&PageLayout> {
        self.layouts.iter().find(|l| l.id == id)
    }

    /// Active layouts in stored order
    pub fn active_layouts(&self) -> impl Iterator<Item = &PageLayout> {
        self.layouts.iter().filter(|l| l.is_active)
    }

    pub fn record_type(&self, id: &str) -> Option<&RecordType> {
        self.record_types.iter().find(|rt| rt.id == id)
    }

    pub fn active_validation_rules(&self) -> impl Iterator<Item = &ValidationRule> {
        self.validation_rules.iter().filter(|r| r.is_active)
    }
}

/// `[A-Z][A-Za-z0-9_]*`
pub fn is_valid_object_api_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_expression(owner: &str, source: &str) -> SchemaResult<()> {
    parser::parse(source.trim())
        .map(|_| ())
        .map_err(|e| SchemaError::InvalidExpression {
            owner: owner.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LayoutSection, LayoutTab};

    fn account() -> CustomObject {
        let mut account = CustomObject::new("Account", "Account");
        account
            .add_field(CustomField::new("name", "Account Name", FieldType::Text).required())
            .unwrap();
        account
            .add_field(CustomField::new("industry", "Industry", FieldType::Picklist))
            .unwrap();
        account
    }

    #[test]
    fn test_object_api_name_rules() {
        assert!(is_valid_object_api_name("Deal"));
        assert!(is_valid_object_api_name("Custom_Object2"));
        assert!(!is_valid_object_api_name("deal"));
        assert!(!is_valid_object_api_name("Deal-Name"));
    }

    #[test]
    fn test_prefixed_field_reference() {
        let account = account();
        assert_eq!(account.field_by_reference("Account__name").unwrap().api_name, "name");
        assert_eq!(account.field_by_reference("name").unwrap().api_name, "name");
        assert!(account.field_by_reference("Account__missing").is_none());
        assert!(account.field_by_reference("Contact__name").is_none());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut account = account();
        let err = account
            .add_field(CustomField::new("name", "Other", FieldType::Text))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Duplicate { kind: EntityKind::Field, .. }));
    }

    #[test]
    fn test_lookup_requires_relationship() {
        let mut account = account();
        let err = account
            .add_field(CustomField::new("parentId", "Parent", FieldType::Lookup))
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingConstraint { .. }));
    }

    #[test]
    fn test_lookup_records_child_object() {
        let mut account = account();
        account
            .add_field(CustomField::new("parentId", "Parent", FieldType::Lookup).with_lookup("Account"))
            .unwrap();
        let relationship = account.field("parentId").unwrap().relationship.clone().unwrap();
        assert_eq!(relationship.child_object, "Account");
    }

    #[test]
    fn test_layout_with_foreign_field_fails_fast() {
        let mut account = account();
        let layout = PageLayout::new("l1", "Default").with_tab(
            LayoutTab::new("t1", "Details")
                .with_section(LayoutSection::new("s1", "Info", 1).with_field("email", 0, 0)),
        );
        let err = account.add_layout(layout).unwrap_err();
        assert!(matches!(err, SchemaError::ForeignField { ref field, .. } if field == "email"));
        assert!(account.layouts.is_empty());
    }

    #[test]
    fn test_layout_column_out_of_range() {
        let mut account = account();
        let layout = PageLayout::new("l1", "Default").with_tab(
            LayoutTab::new("t1", "Details")
                .with_section(LayoutSection::new("s1", "Info", 2).with_field("name", 2, 0)),
        );
        assert!(matches!(
            account.add_layout(layout).unwrap_err(),
            SchemaError::ColumnOutOfRange { column: 2, columns: 2, .. }
        ));
    }

    #[test]
    fn test_invalid_column_count() {
        let mut account = account();
        let layout = PageLayout::new("l1", "Default")
            .with_tab(LayoutTab::new("t1", "Details").with_section(LayoutSection::new("s1", "Info", 4)));
        assert!(matches!(
            account.add_layout(layout).unwrap_err(),
            SchemaError::InvalidColumnCount { columns: 4, .. }
        ));
    }

    #[test]
    fn test_record_type_must_reference_known_layout() {
        let mut account = account();
        let err = account
            .add_record_type(RecordType::new("rt1", "Partner").with_layout("missing"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::NotFound(_)));
    }

    #[test]
    fn test_soft_delete_keeps_field_queryable() {
        let mut account = account();
        account.deactivate_field("industry").unwrap();
        assert!(account.field("industry").is_some());
        assert!(account.active_field("industry").is_none());
        assert_eq!(account.active_fields().count(), 1);
    }

    #[test]
    fn test_invalid_rule_expression_rejected() {
        let mut account = account();
        let err = account
            .add_validation_rule(ValidationRule::new("bad", "name ==", "oops"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidExpression { .. }));
    }
}
