//! Custom field metadata

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::ConditionExpr;

/// Supported field types. New variants need matching arms in the record
/// normalizer and the display formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    TextArea,
    LongTextArea,
    RichTextArea,
    EncryptedText,
    Number,
    Currency,
    Percent,
    Date,
    DateTime,
    Time,
    Checkbox,
    Picklist,
    MultiPicklist,
    Email,
    Phone,
    #[serde(rename = "URL")]
    Url,
    Lookup,
    MasterDetail,
    Address,
    Geolocation,
    AutoNumber,
    Formula,
    RollupSummary,
}

impl FieldType {
    pub const ALL: [FieldType; 24] = [
        FieldType::Text,
        FieldType::TextArea,
        FieldType::LongTextArea,
        FieldType::RichTextArea,
        FieldType::EncryptedText,
        FieldType::Number,
        FieldType::Currency,
        FieldType::Percent,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Time,
        FieldType::Checkbox,
        FieldType::Picklist,
        FieldType::MultiPicklist,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Url,
        FieldType::Lookup,
        FieldType::MasterDetail,
        FieldType::Address,
        FieldType::Geolocation,
        FieldType::AutoNumber,
        FieldType::Formula,
        FieldType::RollupSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::TextArea => "TextArea",
            FieldType::LongTextArea => "LongTextArea",
            FieldType::RichTextArea => "RichTextArea",
            FieldType::EncryptedText => "EncryptedText",
            FieldType::Number => "Number",
            FieldType::Currency => "Currency",
            FieldType::Percent => "Percent",
            FieldType::Date => "Date",
            FieldType::DateTime => "DateTime",
            FieldType::Time => "Time",
            FieldType::Checkbox => "Checkbox",
            FieldType::Picklist => "Picklist",
            FieldType::MultiPicklist => "MultiPicklist",
            FieldType::Email => "Email",
            FieldType::Phone => "Phone",
            FieldType::Url => "URL",
            FieldType::Lookup => "Lookup",
            FieldType::MasterDetail => "MasterDetail",
            FieldType::Address => "Address",
            FieldType::Geolocation => "Geolocation",
            FieldType::AutoNumber => "AutoNumber",
            FieldType::Formula => "Formula",
            FieldType::RollupSummary => "RollupSummary",
        }
    }

    /// Free-text types whose length constraints apply
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            FieldType::Text
                | FieldType::TextArea
                | FieldType::LongTextArea
                | FieldType::RichTextArea
                | FieldType::EncryptedText
                | FieldType::Email
                | FieldType::Phone
                | FieldType::Url
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Number | FieldType::Currency | FieldType::Percent
        )
    }

    pub fn is_picklist(&self) -> bool {
        matches!(self, FieldType::Picklist | FieldType::MultiPicklist)
    }

    /// Fields whose value is another record's id
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Lookup | FieldType::MasterDetail)
    }

    /// Values produced by the system, never written by users
    pub fn is_computed(&self) -> bool {
        matches!(
            self,
            FieldType::Formula | FieldType::RollupSummary | FieldType::AutoNumber
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link from a reference field to the object it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// API name of the target object
    pub lookup_object: String,
    /// Parent side of the relationship (same as `lookup_object`)
    pub parent_object: String,
    /// Child side: the object that owns the reference field
    #[serde(default)]
    pub child_object: String,
    /// Name used for child lists on the parent, e.g. `Contacts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_name: Option<String>,
}

impl Relationship {
    pub fn new(lookup_object: impl Into<String>) -> Self {
        let lookup_object = lookup_object.into();
        Self {
            parent_object: lookup_object.clone(),
            lookup_object,
            child_object: String::new(),
            relationship_name: None,
        }
    }

    pub fn with_relationship_name(mut self, name: impl Into<String>) -> Self {
        self.relationship_name = Some(name.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// An administrator-defined attribute of a custom object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: String,
    #[serde(default)]
    pub object_id: String,
    pub api_name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,

    // Text constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    // Numeric constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub picklist_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// AND-combined; empty means always visible
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible_if: Vec<ConditionExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,
    /// Expression computing the value of a `Formula` field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl CustomField {
    /// Create a field. The id defaults to the API name.
    pub fn new(api_name: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        let api_name = api_name.into();
        Self {
            id: api_name.clone(),
            object_id: String::new(),
            api_name,
            label: label.into(),
            field_type,
            description: None,
            help_text: None,
            required: false,
            unique: false,
            read_only: false,
            is_active: true,
            min_length: None,
            max_length: None,
            precision: None,
            scale: None,
            min: None,
            max: None,
            picklist_values: Vec::new(),
            default_value: None,
            visible_if: Vec::new(),
            relationship: None,
            formula: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_help_text(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = Some(help_text.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_length(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the precision and scale
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn with_picklist_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.picklist_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_visible_if(mut self, conditions: Vec<ConditionExpr>) -> Self {
        self.visible_if = conditions;
        self
    }

    /// Point this reference field at another object
    pub fn with_lookup(mut self, lookup_object: impl Into<String>) -> Self {
        self.relationship = Some(Relationship::new(lookup_object));
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationship = Some(relationship);
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Read-only by flag or by being system-computed
    pub fn is_read_only(&self) -> bool {
        self.read_only || self.field_type.is_computed()
    }

    /// Target object API name of a reference field
    pub fn lookup_object(&self) -> Option<&str> {
        self.relationship
            .as_ref()
            .map(|relationship| relationship.lookup_object.as_str())
    }
}

/// `[a-zA-Z][a-zA-Z0-9_]*`
pub fn is_valid_field_api_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twenty_four_types_round_trip_names() {
        for field_type in FieldType::ALL {
            let json = serde_json::to_value(field_type).unwrap();
            assert_eq!(json, serde_json::Value::String(field_type.as_str().to_string()));
        }
    }

    #[test]
    fn test_field_api_name_rules() {
        assert!(is_valid_field_api_name("dealName"));
        assert!(is_valid_field_api_name("Amount_2"));
        assert!(!is_valid_field_api_name("2amount"));
        assert!(!is_valid_field_api_name("_hidden"));
        assert!(!is_valid_field_api_name("deal-name"));
        assert!(!is_valid_field_api_name(""));
    }

    #[test]
    fn test_computed_fields_are_read_only() {
        let field = CustomField::new("total", "Total", FieldType::Formula);
        assert!(field.is_read_only());
        assert!(!CustomField::new("name", "Name", FieldType::Text).is_read_only());
    }

    #[test]
    fn test_lookup_relationship() {
        let field = CustomField::new("accountId", "Account", FieldType::Lookup).with_lookup("Account");
        assert_eq!(field.lookup_object(), Some("Account"));
        assert_eq!(field.relationship.unwrap().parent_object, "Account");
    }
}
