//! Display strings for stored values

use serde_json::{Map, Value as Json};

use crate::expr::value::format_number;
use crate::record::normalize::{decode_picklist, ADDRESS_PARTS};
use crate::schema::FieldType;

/// Format a stored value for display. Empty values become `placeholder`.
pub fn format_value(field_type: Option<FieldType>, value: &Json, placeholder: &str) -> String {
    let text = match (field_type, value) {
        (Some(t), _) if t.is_picklist() => decode_picklist(value).join(", "),
        (Some(FieldType::Address), Json::Object(map)) => format_address(map),
        (Some(FieldType::Geolocation), Json::Object(map)) => format_geolocation(map),
        (_, Json::Object(map)) if is_address_shaped(map) => format_address(map),
        (_, Json::Object(map)) if is_geolocation_shaped(map) => format_geolocation(map),
        (_, Json::Array(items)) => items
            .iter()
            .map(format_scalar)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        (_, other) => format_scalar(other),
    };
    if text.trim().is_empty() {
        placeholder.to_string()
    } else {
        text
    }
}

/// String coercion; null is empty
pub fn format_scalar(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

pub fn is_address_shaped(map: &Map<String, Json>) -> bool {
    ADDRESS_PARTS.iter().any(|part| map.contains_key(*part))
}

pub fn is_geolocation_shaped(map: &Map<String, Json>) -> bool {
    latitude(map).is_some() || longitude(map).is_some()
}

/// Present address parts joined with `", "`
pub fn format_address(map: &Map<String, Json>) -> String {
    ADDRESS_PARTS
        .iter()
        .filter_map(|part| map.get(*part))
        .map(format_scalar)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"<lat>, <long>"` when both coordinates are present, else empty
pub fn format_geolocation(map: &Map<String, Json>) -> String {
    match (latitude(map), longitude(map)) {
        (Some(lat), Some(long)) => format!("{}, {}", format_scalar(lat), format_scalar(long)),
        _ => String::new(),
    }
}

fn latitude(map: &Map<String, Json>) -> Option<&Json> {
    ["latitude", "lat"]
        .iter()
        .find_map(|key| map.get(*key))
        .filter(|v| !v.is_null())
}

fn longitude(map: &Map<String, Json>) -> Option<&Json> {
    ["longitude", "long", "lng", "lon"]
        .iter()
        .find_map(|key| map.get(*key))
        .filter(|v| !v.is_null())
}
