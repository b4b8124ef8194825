//! The renderer contract: a resolved layout filled with display values
//!
//! One generic renderer serves every object; the UI only has to draw what
//! it returns.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::warn;

use crate::config::RenderConfig;
use crate::expr::{ExpressionEngine, Value};
use crate::layout::{resolve_layout, RecordLayoutRef};
use crate::record::normalize::{decode_for_display, record_context};
use crate::record::validator::{validate_and_normalize, ValidationError, ValidationMode};
use crate::record::Record;
use crate::render::format::format_value;
use crate::render::lookup::{resolve_lookup, LookupSource, NoLookups};
use crate::schema::{CustomField, CustomObject, FieldType, LayoutSection, PageLayout};

/// Read-only detail page or editable form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    Detail,
    Form,
}

/// A field ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedField {
    pub api_name: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Stored value with picklists decoded to a string or list
    pub value: Json,
    pub display: String,
    /// Navigable reference for lookups whose target has a route
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl RenderedField {
    /// Label with the required-field marker used on forms
    pub fn form_label(&self) -> String {
        if self.required && !self.read_only {
            format!("{} *", self.label)
        } else {
            self.label.clone()
        }
    }
}

/// A section as a grid of `columns` columns. Unfilled cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSection {
    pub id: String,
    pub label: String,
    pub columns: u8,
    pub rows: Vec<Vec<Option<RenderedField>>>,
}

impl RenderedSection {
    pub fn fields(&self) -> impl Iterator<Item = &RenderedField> {
        self.rows.iter().flatten().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTab {
    pub id: String,
    pub label: String,
    pub sections: Vec<RenderedSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderedView {
    #[serde(rename_all = "camelCase")]
    Layout {
        layout_id: String,
        layout_name: String,
        tabs: Vec<RenderedTab>,
    },
    /// The object has no active layout: every visible field, in object
    /// order
    Unconfigured { fields: Vec<RenderedField> },
}

impl RenderedView {
    /// Every rendered field, tab by tab and row by row
    pub fn fields(&self) -> Vec<&RenderedField> {
        match self {
            RenderedView::Layout { tabs, .. } => tabs
                .iter()
                .flat_map(|tab| tab.sections.iter())
                .flat_map(|section| section.fields())
                .collect(),
            RenderedView::Unconfigured { fields } => fields.iter().collect(),
        }
    }

    pub fn field(&self, api_name: &str) -> Option<&RenderedField> {
        self.fields().into_iter().find(|f| f.api_name == api_name)
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, RenderedView::Layout { .. })
    }
}

/// Renders records of any object through their resolved layout
pub struct Renderer<'a> {
    engine: &'a ExpressionEngine,
    config: &'a RenderConfig,
    lookups: &'a dyn LookupSource,
}

impl<'a> Renderer<'a> {
    pub fn new(engine: &'a ExpressionEngine, config: &'a RenderConfig) -> Self {
        Self {
            engine,
            config,
            lookups: &NoLookups,
        }
    }

    /// Resolve lookup labels from `lookups`
    pub fn with_lookups(mut self, lookups: &'a dyn LookupSource) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn render_record(&self, object: &CustomObject, record: &Record, mode: RenderMode) -> RenderedView {
        self.render(object, &record.layout_ref(), &record.data, mode)
    }

    /// Render `data` through the layout resolved for `record`
    pub fn render(
        &self,
        object: &CustomObject,
        record: &RecordLayoutRef,
        data: &Map<String, Json>,
        mode: RenderMode,
    ) -> RenderedView {
        let (data, context) = self.computed(object, data);
        let renderer = FieldRenderer {
            renderer: self,
            object,
            data: &data,
            context: &context,
            mode,
        };

        match resolve_layout(record, object) {
            Some(layout) => renderer.layout(layout),
            None => RenderedView::Unconfigured {
                fields: object
                    .active_fields()
                    .filter_map(|field| renderer.field(field))
                    .collect(),
            },
        }
    }

    /// Active fields visible for `data`, in object order
    pub fn visible_fields<'o>(&self, object: &'o CustomObject, data: &Map<String, Json>) -> Vec<&'o CustomField> {
        let (_, context) = self.computed(object, data);
        object
            .active_fields()
            .filter(|field| is_field_visible(self.engine, object, field, &context))
            .collect()
    }

    /// Client-side check before submitting a form; same rules as the
    /// record validator
    pub fn validate_form(
        &self,
        object: &CustomObject,
        payload: &Map<String, Json>,
        mode: ValidationMode,
    ) -> Vec<ValidationError> {
        validate_and_normalize(object, payload, mode, self.engine)
            .err()
            .unwrap_or_default()
    }

    /// `data` with formula fields filled in, and the matching expression
    /// context
    fn computed(&self, object: &CustomObject, data: &Map<String, Json>) -> (Map<String, Json>, HashMap<String, Value>) {
        let mut data = data.clone();
        let mut context = record_context(object, &data);
        for field in object.active_fields() {
            let Some(formula) = field.formula.as_deref() else {
                continue;
            };
            let value = match self.engine.evaluate(formula, &context) {
                Ok(value) => value,
                Err(e) => {
                    warn!(object = %object.api_name, field = %field.api_name, error = %e, "formula failed");
                    Value::Null
                }
            };
            data.insert(field.api_name.clone(), value.to_json());
            context.insert(field.api_name.clone(), value);
        }
        (data, context)
    }
}

fn is_field_visible(
    engine: &ExpressionEngine,
    object: &CustomObject,
    field: &CustomField,
    context: &HashMap<String, Value>,
) -> bool {
    engine.is_visible(&object.canonical_conditions(&field.visible_if), context)
}

struct FieldRenderer<'r, 'a> {
    renderer: &'r Renderer<'a>,
    object: &'r CustomObject,
    data: &'r Map<String, Json>,
    context: &'r HashMap<String, Value>,
    mode: RenderMode,
}

impl FieldRenderer<'_, '_> {
    fn layout(&self, layout: &PageLayout) -> RenderedView {
        let tabs = layout
            .tabs
            .iter()
            .map(|tab| RenderedTab {
                id: tab.id.clone(),
                label: tab.label.clone(),
                sections: tab.sections.iter().map(|s| self.section(s)).collect(),
            })
            .collect();
        RenderedView::Layout {
            layout_id: layout.id.clone(),
            layout_name: layout.name.clone(),
            tabs,
        }
    }

    /// Place fields at row `order / columns`, column `column`. A taken cell
    /// pushes the field down to the next free row in its column.
    fn section(&self, section: &LayoutSection) -> RenderedSection {
        let columns = section.columns.max(1) as usize;
        let mut placed: Vec<_> = section.fields.iter().collect();
        placed.sort_by_key(|f| f.order);

        let mut rows: Vec<Vec<Option<RenderedField>>> = Vec::new();
        for layout_field in placed {
            let Some(field) = self
                .object
                .field_by_reference(&layout_field.field_id)
                .filter(|f| f.is_active)
            else {
                continue;
            };
            let Some(rendered) = self.field(field) else {
                continue;
            };

            let column = (layout_field.column as usize).min(columns - 1);
            let mut row = layout_field.order as usize / columns;
            loop {
                if rows.len() <= row {
                    rows.resize_with(row + 1, || vec![None; columns]);
                }
                if rows[row][column].is_none() {
                    rows[row][column] = Some(rendered);
                    break;
                }
                row += 1;
            }
        }

        RenderedSection {
            id: section.id.clone(),
            label: section.label.clone(),
            columns: columns as u8,
            rows,
        }
    }

    /// `None` when the field's visibility conditions exclude it
    fn field(&self, field: &CustomField) -> Option<RenderedField> {
        if !is_field_visible(self.renderer.engine, self.object, field, self.context) {
            return None;
        }
        let stored = self.data.get(&field.api_name).unwrap_or(&Json::Null);
        let value = decode_for_display(field, stored);
        let placeholder = match self.mode {
            RenderMode::Detail => self.renderer.config.placeholder.as_str(),
            RenderMode::Form => "",
        };

        let (display, link) = match (field.lookup_object(), stored) {
            (Some(target), Json::String(id)) if field.field_type.is_reference() && !id.is_empty() => {
                let resolved = resolve_lookup(self.renderer.config, self.renderer.lookups, target, id);
                (resolved.label, resolved.link)
            }
            _ => (format_value(Some(field.field_type), stored, placeholder), None),
        };

        Some(RenderedField {
            api_name: field.api_name.clone(),
            label: field.label.clone(),
            field_type: field.field_type,
            required: field.required,
            read_only: field.is_read_only(),
            help_text: field.help_text.clone(),
            value,
            display,
            link,
        })
    }
}
