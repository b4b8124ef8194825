//! Page layouts: tabs of sections of placed fields

use serde::{Deserialize, Serialize};

/// Purpose of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutType {
    Create,
    Edit,
    #[default]
    Detail,
    Compact,
}

fn default_true() -> bool {
    true
}

/// An arrangement of an object's fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    pub id: String,
    #[serde(default)]
    pub object_id: String,
    pub name: String,
    #[serde(default)]
    pub layout_type: LayoutType,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub tabs: Vec<LayoutTab>,
}

impl PageLayout {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object_id: String::new(),
            name: name.into(),
            layout_type: LayoutType::Detail,
            is_default: false,
            is_active: true,
            tabs: Vec::new(),
        }
    }

    pub fn with_type(mut self, layout_type: LayoutType) -> Self {
        self.layout_type = layout_type;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_tab(mut self, tab: LayoutTab) -> Self {
        self.tabs.push(tab);
        self
    }

    /// Every placed field, in tab → section → stored order
    pub fn placed_fields(&self) -> impl Iterator<Item = &LayoutField> {
        self.tabs
            .iter()
            .flat_map(|tab| tab.sections.iter())
            .flat_map(|section| section.fields.iter())
    }

    pub fn sections(&self) -> impl Iterator<Item = &LayoutSection> {
        self.tabs.iter().flat_map(|tab| tab.sections.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTab {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub sections: Vec<LayoutSection>,
}

impl LayoutTab {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            sections: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: LayoutSection) -> Self {
        self.sections.push(section);
        self
    }
}

fn default_columns() -> u8 {
    1
}

/// A grid of `columns` columns inside a tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSection {
    pub id: String,
    pub label: String,
    #[serde(default = "default_columns")]
    pub columns: u8,
    #[serde(default)]
    pub fields: Vec<LayoutField>,
}

impl LayoutSection {
    pub fn new(id: impl Into<String>, label: impl Into<String>, columns: u8) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            columns,
            fields: Vec::new(),
        }
    }

    /// Place `field_id` at `column`, `order`-th in reading order
    pub fn with_field(mut self, field_id: impl Into<String>, column: u8, order: u32) -> Self {
        self.fields.push(LayoutField::new(field_id, column, order));
        self
    }
}

/// Placement of one field in a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutField {
    /// Field id, or a field API name (possibly `<Object>__`-prefixed)
    pub field_id: String,
    #[serde(default)]
    pub column: u8,
    #[serde(default)]
    pub order: u32,
}

impl LayoutField {
    pub fn new(field_id: impl Into<String>, column: u8, order: u32) -> Self {
        Self {
            field_id: field_id.into(),
            column,
            order,
        }
    }
}
