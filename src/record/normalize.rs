//! Per-type coercion of payload values into their stored form
//!
//! Stored shapes:
//!
//! | Field type | Stored value |
//! |---|---|
//! | text kinds, Email, Phone, URL | string |
//! | Number, Currency, Percent | number, rounded to `scale` |
//! | Date | `"YYYY-MM-DD"` |
//! | DateTime | RFC 3339 in UTC, `"2024-05-01T09:30:00Z"` |
//! | Time | `"HH:MM:SS"` |
//! | Checkbox | bool |
//! | Picklist, MultiPicklist | list-encoded string, `["a","b"]` |
//! | Lookup, MasterDetail | record id string |
//! | Address | object of `street`/`city`/`state`/`postalCode`/`country` |
//! | Geolocation | `{ "latitude": f64, "longitude": f64 }` |
//!
//! Empty input (null, blank text, empty list) normalizes to null.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as Json};

use crate::expr::value::{decode_list, format_number, parse_date, Value};
use crate::record::validator::{ErrorKind, ValidationError};
use crate::schema::{CustomField, CustomObject, FieldType};

pub const ADDRESS_PARTS: [&str; 5] = ["street", "city", "state", "postalCode", "country"];

pub type NormalizeResult = Result<Json, ValidationError>;

/// Coerce `raw` into the stored shape for `field`
pub fn normalize_value(field: &CustomField, raw: &Json) -> NormalizeResult {
    if is_empty(raw) {
        return Ok(Json::Null);
    }
    let n = Normalizer { field };
    match field.field_type {
        FieldType::Text
        | FieldType::TextArea
        | FieldType::LongTextArea
        | FieldType::RichTextArea
        | FieldType::EncryptedText => n.text(raw),
        FieldType::Email => n.email(raw),
        FieldType::Phone => n.phone(raw),
        FieldType::Url => n.url(raw),
        FieldType::Number | FieldType::Currency | FieldType::Percent => n.number(raw),
        FieldType::Date => n.date(raw),
        FieldType::DateTime => n.datetime(raw),
        FieldType::Time => n.time(raw),
        FieldType::Checkbox => n.checkbox(raw),
        FieldType::Picklist => n.picklist(raw, false),
        FieldType::MultiPicklist => n.picklist(raw, true),
        FieldType::Lookup | FieldType::MasterDetail => n.reference(raw),
        FieldType::Address => n.address(raw),
        FieldType::Geolocation => n.geolocation(raw),
        // System-computed; the validator rejects writes before we get here
        FieldType::AutoNumber | FieldType::Formula | FieldType::RollupSummary => Ok(raw.clone()),
    }
}

/// Null, blank text, an empty array or an empty object
pub fn is_empty(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        Json::Array(items) => items.is_empty(),
        Json::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Canonical list encoding for picklist storage
pub fn encode_list<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
}

/// Items of a stored picklist value, in stored order
pub fn decode_picklist(stored: &Json) -> Vec<String> {
    match stored {
        Json::Null => Vec::new(),
        Json::String(s) => decode_list(s),
        Json::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

/// The value a uniqueness check compares, or `None` when the value never
/// collides (empty). Text kinds compare trimmed and case-folded. Both sides
/// of a comparison must come from this function.
pub fn unique_key(field: &CustomField, stored: &Json) -> Option<String> {
    if is_empty(stored) {
        return None;
    }
    let key = match (field.field_type, stored) {
        (t, Json::String(s)) if t.is_text() => s.trim().to_lowercase(),
        (t, _) if t.is_picklist() => encode_list(&decode_picklist(stored)),
        (_, Json::String(s)) => s.clone(),
        (_, Json::Number(n)) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        (_, other) => other.to_string(),
    };
    Some(key)
}

/// Build the expression context for a record: stored values decoded into
/// runtime values (Picklist as its single item, MultiPicklist as a list,
/// Date and DateTime as dates). Keys not defined on the object are passed
/// through, and so are stored dates that no longer parse.
pub fn record_context(object: &CustomObject, data: &Map<String, Json>) -> HashMap<String, Value> {
    data.iter()
        .map(|(key, stored)| {
            let value = match object.field(key).map(|f| f.field_type) {
                Some(FieldType::Picklist) => decode_picklist(stored)
                    .into_iter()
                    .next()
                    .map(Value::Text)
                    .unwrap_or(Value::Null),
                Some(FieldType::MultiPicklist) => {
                    Value::List(decode_picklist(stored).into_iter().map(Value::Text).collect())
                }
                Some(FieldType::Date) => stored
                    .as_str()
                    .and_then(parse_date)
                    .map(Value::Date)
                    .unwrap_or_else(|| Value::from(stored)),
                Some(FieldType::DateTime) => stored
                    .as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
                    .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                    .unwrap_or_else(|| Value::from(stored)),
                _ => Value::from(stored),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Picklists decoded back to JSON lists or strings, for presenting a
/// stored value to a form
pub fn decode_for_display(field: &CustomField, stored: &Json) -> Json {
    match field.field_type {
        FieldType::Picklist => decode_picklist(stored)
            .into_iter()
            .next()
            .map(Json::String)
            .unwrap_or(Json::Null),
        FieldType::MultiPicklist => {
            Json::Array(decode_picklist(stored).into_iter().map(Json::String).collect())
        }
        _ => stored.clone(),
    }
}

fn scalar_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.as_f64().map(format_number).unwrap_or_else(|| n.to_string())),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a finite float to a JSON number, integral values without `.0`
pub fn json_number(n: f64) -> Option<Json> {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Some(Json::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Json::Number)
}

struct Normalizer<'f> {
    field: &'f CustomField,
}

impl Normalizer<'_> {
    fn error(&self, reason: ErrorKind, message: impl Into<String>) -> ValidationError {
        ValidationError::new(&self.field.api_name, reason, message)
    }

    fn invalid_type(&self, raw: &Json) -> ValidationError {
        self.error(
            ErrorKind::InvalidType,
            format!(
                "{} expects a {} value, got {}",
                self.field.label,
                self.field.field_type,
                json_type_name(raw)
            ),
        )
    }

    fn string<'r>(&self, raw: &'r Json) -> Result<Cow<'r, str>, ValidationError> {
        match raw {
            Json::String(s) => Ok(Cow::Borrowed(s.as_str())),
            Json::Number(_) | Json::Bool(_) => Ok(Cow::Owned(
                scalar_text(raw).unwrap_or_default(),
            )),
            other => Err(self.invalid_type(other)),
        }
    }

    fn check_length(&self, text: &str) -> Result<(), ValidationError> {
        let len = text.chars().count() as u32;
        if let Some(min) = self.field.min_length.filter(|min| len < *min) {
            return Err(self.error(
                ErrorKind::TooShort,
                format!("{} must be at least {} characters", self.field.label, min),
            ));
        }
        if let Some(max) = self.field.max_length.filter(|max| len > *max) {
            return Err(self.error(
                ErrorKind::TooLong,
                format!("{} must be at most {} characters", self.field.label, max),
            ));
        }
        Ok(())
    }

    fn text(&self, raw: &Json) -> NormalizeResult {
        let text = self.string(raw)?;
        self.check_length(&text)?;
        Ok(Json::String(text.into_owned()))
    }

    fn email(&self, raw: &Json) -> NormalizeResult {
        let text = self.string(raw)?;
        let email = text.trim();
        if !is_email(email) {
            return Err(self.error(
                ErrorKind::InvalidFormat,
                format!("'{}' is not a valid email address", email),
            ));
        }
        self.check_length(email)?;
        Ok(Json::String(email.to_string()))
    }

    fn phone(&self, raw: &Json) -> NormalizeResult {
        let text = self.string(raw)?;
        let phone = text.trim();
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        let allowed = phone
            .chars()
            .all(|c| c.is_ascii_digit() || " +-().x".contains(c));
        if digits < 3 || !allowed {
            return Err(self.error(
                ErrorKind::InvalidFormat,
                format!("'{}' is not a valid phone number", phone),
            ));
        }
        self.check_length(phone)?;
        Ok(Json::String(phone.to_string()))
    }

    fn url(&self, raw: &Json) -> NormalizeResult {
        let text = self.string(raw)?;
        let url = text.trim();
        if !is_url(url) {
            return Err(self.error(
                ErrorKind::InvalidFormat,
                format!("'{}' is not a valid URL", url),
            ));
        }
        self.check_length(url)?;
        Ok(Json::String(url.to_string()))
    }

    fn number(&self, raw: &Json) -> NormalizeResult {
        let n = match raw {
            Json::Number(n) => n.as_f64(),
            Json::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite())
        .ok_or_else(|| self.invalid_type(raw))?;

        let n = match self.field.scale {
            Some(scale) => {
                let factor = 10f64.powi(scale as i32);
                (n * factor).round() / factor
            }
            None => n,
        };

        if let Some(precision) = self.field.precision {
            let whole = n.abs().trunc();
            let integer_digits = if whole < 1.0 {
                0
            } else {
                whole.log10().floor() as u32 + 1
            };
            let allowed = precision.saturating_sub(self.field.scale.unwrap_or(0)) as u32;
            if integer_digits > allowed {
                return Err(self.error(
                    ErrorKind::OutOfRange,
                    format!(
                        "{} allows at most {} digits before the decimal point",
                        self.field.label, allowed
                    ),
                ));
            }
        }
        if let Some(min) = self.field.min.filter(|min| n < *min) {
            return Err(self.error(
                ErrorKind::OutOfRange,
                format!("{} must be at least {}", self.field.label, format_number(min)),
            ));
        }
        if let Some(max) = self.field.max.filter(|max| n > *max) {
            return Err(self.error(
                ErrorKind::OutOfRange,
                format!("{} must be at most {}", self.field.label, format_number(max)),
            ));
        }
        json_number(n).ok_or_else(|| self.invalid_type(raw))
    }

    fn date(&self, raw: &Json) -> NormalizeResult {
        let text = self.string(raw)?;
        let date = parse_date(&text).ok_or_else(|| {
            self.error(
                ErrorKind::InvalidFormat,
                format!("'{}' is not a date (expected YYYY-MM-DD)", text),
            )
        })?;
        Ok(Json::String(date.format("%Y-%m-%d").to_string()))
    }

    fn datetime(&self, raw: &Json) -> NormalizeResult {
        let text = self.string(raw)?;
        let trimmed = text.trim();
        let parsed = DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
                    .ok()
                    .map(|naive| naive.and_utc())
            })
            .or_else(|| {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            })
            .ok_or_else(|| {
                self.error(
                    ErrorKind::InvalidFormat,
                    format!("'{}' is not a date and time", trimmed),
                )
            })?;
        Ok(Json::String(parsed.to_rfc3339_opts(SecondsFormat::Secs, true)))
    }

    fn time(&self, raw: &Json) -> NormalizeResult {
        let text = self.string(raw)?;
        let trimmed = text.trim();
        let time = NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
            .map_err(|_| {
                self.error(
                    ErrorKind::InvalidFormat,
                    format!("'{}' is not a time (expected HH:MM)", trimmed),
                )
            })?;
        Ok(Json::String(time.format("%H:%M:%S").to_string()))
    }

    fn checkbox(&self, raw: &Json) -> NormalizeResult {
        let checked = match raw {
            Json::Bool(b) => Some(*b),
            Json::Number(n) => match n.as_f64() {
                Some(v) if v == 0.0 => Some(false),
                Some(v) if v == 1.0 => Some(true),
                _ => None,
            },
            Json::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        };
        checked.map(Json::Bool).ok_or_else(|| self.invalid_type(raw))
    }

    fn picklist(&self, raw: &Json, multi: bool) -> NormalizeResult {
        let items = match raw {
            Json::Array(items) => items
                .iter()
                .map(|item| scalar_text(item).ok_or_else(|| self.invalid_type(item)))
                .collect::<Result<Vec<_>, _>>()?,
            Json::String(s) => decode_list(s),
            other => scalar_text(other)
                .map(|s| vec![s])
                .ok_or_else(|| self.invalid_type(other))?,
        };

        let mut selected: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let item = item.trim().to_string();
            if !item.is_empty() && !selected.contains(&item) {
                selected.push(item);
            }
        }
        if selected.is_empty() {
            return Ok(Json::Null);
        }
        if !multi && selected.len() > 1 {
            return Err(self.error(
                ErrorKind::InvalidType,
                format!("{} accepts a single value", self.field.label),
            ));
        }
        if !self.field.picklist_values.is_empty() {
            if let Some(bad) = selected
                .iter()
                .find(|item| !self.field.picklist_values.contains(item))
            {
                return Err(self.error(
                    ErrorKind::InvalidOption,
                    format!("'{}' is not a valid option for {}", bad, self.field.label),
                ));
            }
        }
        Ok(Json::String(encode_list(&selected)))
    }

    fn reference(&self, raw: &Json) -> NormalizeResult {
        let id = match raw {
            Json::Object(map) => map.get("id").and_then(scalar_text),
            Json::String(s) => Some(s.trim().to_string()),
            Json::Number(_) => scalar_text(raw),
            _ => None,
        }
        .filter(|id| !id.is_empty())
        .ok_or_else(|| self.invalid_type(raw))?;
        Ok(Json::String(id))
    }

    fn address(&self, raw: &Json) -> NormalizeResult {
        let Json::Object(map) = raw else {
            return Err(self.invalid_type(raw));
        };
        if let Some(unknown) = map.keys().find(|key| !ADDRESS_PARTS.contains(&key.as_str())) {
            return Err(self.error(
                ErrorKind::InvalidFormat,
                format!("'{}' is not an address part", unknown),
            ));
        }
        let mut address = Map::new();
        for part in ADDRESS_PARTS {
            match map.get(part) {
                None | Some(Json::Null) => {}
                Some(value) => {
                    let text = scalar_text(value).ok_or_else(|| self.invalid_type(value))?;
                    let text = text.trim();
                    if !text.is_empty() {
                        address.insert(part.to_string(), Json::String(text.to_string()));
                    }
                }
            }
        }
        if address.is_empty() {
            return Ok(Json::Null);
        }
        Ok(Json::Object(address))
    }

    fn geolocation(&self, raw: &Json) -> NormalizeResult {
        let Json::Object(map) = raw else {
            return Err(self.invalid_type(raw));
        };
        let coordinate = |keys: &[&str]| -> Result<Option<f64>, ValidationError> {
            match keys.iter().find_map(|key| map.get(*key)) {
                None | Some(Json::Null) => Ok(None),
                Some(Json::Number(n)) => Ok(n.as_f64()),
                Some(Json::String(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| self.invalid_type(raw)),
                Some(other) => Err(self.invalid_type(other)),
            }
        };
        let latitude = coordinate(&["latitude", "lat"])?;
        let longitude = coordinate(&["longitude", "long", "lng", "lon"])?;
        match (latitude, longitude) {
            (None, None) => Ok(Json::Null),
            (Some(lat), Some(long))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&long) =>
            {
                let mut point = Map::new();
                point.insert("latitude".to_string(), json_number(lat).unwrap_or(Json::Null));
                point.insert("longitude".to_string(), json_number(long).unwrap_or(Json::Null));
                Ok(Json::Object(point))
            }
            (Some(_), Some(_)) => Err(self.error(
                ErrorKind::OutOfRange,
                format!("{} coordinates are out of range", self.field.label),
            )),
            _ => Err(self.error(
                ErrorKind::InvalidFormat,
                format!("{} needs both latitude and longitude", self.field.label),
            )),
        }
    }
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !text.chars().any(char::is_whitespace)
}

fn is_url(text: &str) -> bool {
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        return false;
    }
    let rest = text
        .strip_prefix("https://")
        .or_else(|| text.strip_prefix("http://"))
        .unwrap_or(text);
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    host.contains('.') && !host.starts_with('.') && !host.ends_with('.')
}

fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "text",
        Json::Array(_) => "list",
        Json::Object(_) => "object",
    }
}
