//! Resolving lookup values to human-readable labels

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RenderConfig;
use crate::expr::value::format_number;
use crate::record::Record;

/// Pseudo field naming the store-assigned record number
pub const RECORD_NUMBER_KEY: &str = "recordNumber";

/// One candidate for a record's display label: a single field, or several
/// fields joined with spaces (e.g. first and last name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayKey {
    Field(String),
    Composite(Vec<String>),
}

impl DisplayKey {
    fn field(name: &str) -> Self {
        DisplayKey::Field(name.to_string())
    }

    fn composite(names: &[&str]) -> Self {
        DisplayKey::Composite(names.iter().map(|n| n.to_string()).collect())
    }

    /// The label this key yields for `record`, if every part it needs is
    /// present (composites need at least one)
    pub fn label(&self, record: &Record) -> Option<String> {
        match self {
            DisplayKey::Field(name) => field_text(record, name),
            DisplayKey::Composite(names) => {
                let parts: Vec<String> = names.iter().filter_map(|n| field_text(record, n)).collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            }
        }
    }
}

fn field_text(record: &Record, name: &str) -> Option<String> {
    let text = match record.data.get(name) {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.as_f64().map(format_number)?,
        Some(serde_json::Value::Null) | None if name == RECORD_NUMBER_KEY => {
            return (record.record_number > 0).then(|| record.record_number.to_string());
        }
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Display keys for the standard objects, most preferred first
pub fn default_display_fields() -> HashMap<String, Vec<DisplayKey>> {
    let mut fields = HashMap::new();
    fields.insert(
        "Account".to_string(),
        vec![
            DisplayKey::field("accountName"),
            DisplayKey::field("name"),
            DisplayKey::field("accountNumber"),
            DisplayKey::field(RECORD_NUMBER_KEY),
        ],
    );
    fields.insert(
        "Contact".to_string(),
        vec![
            DisplayKey::field("name"),
            DisplayKey::composite(&["firstName", "lastName"]),
            DisplayKey::field("email"),
            DisplayKey::field(RECORD_NUMBER_KEY),
        ],
    );
    fields.insert(
        "Deal".to_string(),
        vec![
            DisplayKey::field("dealName"),
            DisplayKey::field("name"),
            DisplayKey::field(RECORD_NUMBER_KEY),
        ],
    );
    fields.insert(
        "Lead".to_string(),
        vec![
            DisplayKey::composite(&["firstName", "lastName"]),
            DisplayKey::field("company"),
            DisplayKey::field("email"),
            DisplayKey::field(RECORD_NUMBER_KEY),
        ],
    );
    fields.insert(
        "Property".to_string(),
        vec![DisplayKey::field("name"), DisplayKey::field(RECORD_NUMBER_KEY)],
    );
    fields
}

/// Route prefixes for the standard objects
pub fn default_routes() -> HashMap<String, String> {
    [
        ("Account", "/accounts"),
        ("Contact", "/contacts"),
        ("Deal", "/deals"),
        ("Lead", "/leads"),
        ("Property", "/properties"),
    ]
    .into_iter()
    .map(|(object, route)| (object.to_string(), route.to_string()))
    .collect()
}

/// Keys tried for objects without a configured list
fn fallback_display_fields() -> Vec<DisplayKey> {
    vec![DisplayKey::field("name"), DisplayKey::field(RECORD_NUMBER_KEY)]
}

/// Already-fetched related records. The renderer never performs I/O; the
/// caller supplies whatever it loaded.
pub trait LookupSource {
    fn find_related(&self, object_api_name: &str, record_id: &str) -> Option<Record>;
}

/// A lookup source that knows no records; every lookup shows its raw id
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookups;

impl LookupSource for NoLookups {
    fn find_related(&self, _object_api_name: &str, _record_id: &str) -> Option<Record> {
        None
    }
}

/// Related records keyed by (object API name, record id)
#[derive(Debug, Clone, Default)]
pub struct RelatedRecords {
    records: HashMap<(String, String), Record>,
}

impl RelatedRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object_api_name: impl Into<String>, record: Record) {
        self.records
            .insert((object_api_name.into(), record.id.clone()), record);
    }

    pub fn with(mut self, object_api_name: impl Into<String>, record: Record) -> Self {
        self.insert(object_api_name, record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl LookupSource for RelatedRecords {
    fn find_related(&self, object_api_name: &str, record_id: &str) -> Option<Record> {
        self.records
            .get(&(object_api_name.to_string(), record_id.to_string()))
            .cloned()
    }
}

/// Label and optional link for a lookup value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLookup {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Resolve `record_id` of `object_api_name` to a label. Falls back to the
/// raw id when the record is unknown or has none of the display fields.
pub fn resolve_lookup(
    config: &RenderConfig,
    lookups: &dyn LookupSource,
    object_api_name: &str,
    record_id: &str,
) -> ResolvedLookup {
    let label = match lookups.find_related(object_api_name, record_id) {
        Some(record) => {
            let keys = config.display_fields.get(object_api_name);
            let fallback;
            let keys = match keys {
                Some(keys) => keys,
                None => {
                    fallback = fallback_display_fields();
                    &fallback
                }
            };
            keys.iter()
                .find_map(|key| key.label(&record))
                .unwrap_or_else(|| record_id.to_string())
        }
        None => {
            warn!(object = object_api_name, record_id, "lookup target not found");
            record_id.to_string()
        }
    };
    let link = config
        .routes
        .get(object_api_name)
        .map(|route| format!("{}/{}", route.trim_end_matches('/'), record_id));
    ResolvedLookup { label, link }
}
