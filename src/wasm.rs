//! WebAssembly bindings for the browser client
//!
//! # Usage from JavaScript
//!
//! ```javascript
//! import init, { evaluateExpression, WasmSchema } from 'crmrust';
//!
//! await init();
//!
//! const result = evaluateExpression('IF(amount > 5, "big", "small")', { amount: 10 });
//! console.log(result.value); // "big"
//!
//! const schema = new WasmSchema();
//! schema.loadStandard();
//!
//! const view = schema.renderRecord('Deal', { data: { dealName: 'Acme' } }, 'detail');
//! const errors = schema.validateRecord('Deal', {}, 'create');
//! // errors: [{ field: 'dealName', reason: 'required', message: 'Deal Name is required' }]
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::expr::{self, ExpressionEngine};
use crate::layout::RecordLayoutRef;
use crate::record::{validate_and_normalize, Record, ValidationMode};
use crate::render::{RelatedRecords, RenderMode, Renderer};
use crate::schema::{create_standard_schema, SchemaSnapshot};

/// Helper to serialize values as plain JS objects (not Maps)
fn to_js_value<T: Serialize>(value: &T) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Evaluate an expression against a plain object
///
/// Returns `{ success, value }` or `{ success: false, error }`.
#[wasm_bindgen(js_name = evaluateExpression)]
pub fn evaluate_expression(expression: &str, context: JsValue) -> JsValue {
    let context: serde_json::Map<String, serde_json::Value> =
        match serde_wasm_bindgen::from_value(context) {
            Ok(context) => context,
            Err(e) => {
                return to_js_value(&serde_json::json!({
                    "success": false,
                    "error": format!("Invalid context: {}", e),
                }))
            }
        };

    match expr::evaluate(expression, &context) {
        Ok(value) => to_js_value(&serde_json::json!({
            "success": true,
            "value": value.to_json(),
        })),
        Err(e) => to_js_value(&serde_json::json!({
            "success": false,
            "error": e.to_string(),
        })),
    }
}

/// `{ isValid, error? }`
#[wasm_bindgen(js_name = validateExpression)]
pub fn validate_expression(expression: &str) -> JsValue {
    to_js_value(&ExpressionEngine::new().validate(expression))
}

/// Field names referenced by an expression; an empty array if it does not
/// parse
#[wasm_bindgen(js_name = getFieldReferences)]
pub fn get_field_references(expression: &str) -> JsValue {
    let references = expr::parse(expression)
        .map(|ast| ast.field_references())
        .unwrap_or_default();
    to_js_value(&references)
}

/// A schema snapshot plus the engine and config used to render against it
#[wasm_bindgen]
pub struct WasmSchema {
    inner: SchemaSnapshot,
    engine: ExpressionEngine,
    config: EngineConfig,
}

#[wasm_bindgen]
impl WasmSchema {
    /// Create a new empty schema
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmSchema {
        WasmSchema {
            inner: SchemaSnapshot::new(),
            engine: ExpressionEngine::new(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the schema with `{ objects: [...] }`
    #[wasm_bindgen(js_name = loadFromJson)]
    pub fn load_from_json(&mut self, schema_json: JsValue) -> Result<(), JsValue> {
        let json: serde_json::Value = serde_wasm_bindgen::from_value(schema_json)
            .map_err(|e| js_error(format!("Invalid JSON: {}", e)))?;
        self.inner = SchemaSnapshot::from_json(&json.to_string()).map_err(js_error)?;
        Ok(())
    }

    /// Load the built-in CRM objects
    #[wasm_bindgen(js_name = loadStandard)]
    pub fn load_standard(&mut self) -> Result<(), JsValue> {
        self.inner = create_standard_schema().map_err(js_error)?;
        Ok(())
    }

    /// Apply an engine configuration document
    #[wasm_bindgen(js_name = configure)]
    pub fn configure(&mut self, config_json: JsValue) -> Result<(), JsValue> {
        let json: serde_json::Value = serde_wasm_bindgen::from_value(config_json)
            .map_err(|e| js_error(format!("Invalid JSON: {}", e)))?;
        let config = EngineConfig::from_json(&json.to_string()).map_err(js_error)?;
        self.engine = ExpressionEngine::with_config(config.expression.clone());
        self.config = config;
        Ok(())
    }

    #[wasm_bindgen(js_name = hasObject)]
    pub fn has_object(&self, api_name: &str) -> bool {
        self.inner.active_object(api_name).is_ok()
    }

    #[wasm_bindgen(js_name = getObjectNames)]
    pub fn get_object_names(&self) -> JsValue {
        let names: Vec<&str> = self.inner.active_objects().map(|o| o.api_name.as_str()).collect();
        to_js_value(&names)
    }

    /// Render a record (`{ data, pageLayoutId?, recordTypeId? }`) in
    /// `"detail"` or `"form"` mode. `related` is an optional array of
    /// `{ object, record }` pairs used to label lookups.
    #[wasm_bindgen(js_name = renderRecord)]
    pub fn render_record(
        &self,
        object_api_name: &str,
        record: JsValue,
        mode: &str,
        related: JsValue,
    ) -> Result<JsValue, JsValue> {
        let object = self.inner.active_object(object_api_name).map_err(js_error)?;
        let record: RecordInput = serde_wasm_bindgen::from_value(record)
            .map_err(|e| js_error(format!("Invalid record: {}", e)))?;
        let mode = match mode {
            "form" => RenderMode::Form,
            _ => RenderMode::Detail,
        };

        let mut lookups = RelatedRecords::new();
        if !related.is_undefined() && !related.is_null() {
            let pairs: Vec<RelatedInput> = serde_wasm_bindgen::from_value(related)
                .map_err(|e| js_error(format!("Invalid related records: {}", e)))?;
            for pair in pairs {
                lookups.insert(pair.object, pair.record);
            }
        }

        let view = Renderer::new(&self.engine, &self.config.render)
            .with_lookups(&lookups)
            .render(object, &record.layout, &record.data, mode);
        Ok(to_js_value(&view))
    }

    /// Validate a payload in `"create"` or `"update"` mode. Returns the
    /// list of `{ field, reason, message }`, empty when valid.
    #[wasm_bindgen(js_name = validateRecord)]
    pub fn validate_record(
        &self,
        object_api_name: &str,
        payload: JsValue,
        mode: &str,
    ) -> Result<JsValue, JsValue> {
        let object = self.inner.active_object(object_api_name).map_err(js_error)?;
        let payload: serde_json::Map<String, serde_json::Value> =
            serde_wasm_bindgen::from_value(payload)
                .map_err(|e| js_error(format!("Invalid payload: {}", e)))?;
        let mode = match mode {
            "update" => ValidationMode::Update,
            _ => ValidationMode::Create,
        };
        let errors = validate_and_normalize(object, &payload, mode, &self.engine)
            .err()
            .unwrap_or_default();
        Ok(to_js_value(&errors))
    }
}

impl Default for WasmSchema {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordInput {
    #[serde(default)]
    data: serde_json::Map<String, serde_json::Value>,
    #[serde(flatten)]
    layout: RecordLayoutRef,
}

#[derive(serde::Deserialize)]
struct RelatedInput {
    object: String,
    record: Record,
}
