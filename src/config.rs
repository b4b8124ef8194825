//! Engine configuration
//!
//! All sections default sensibly, so a partial JSON document only needs to
//! name what it overrides:
//!
//! ```rust
//! use crmrust::config::{EngineConfig, ErrorPolicy};
//!
//! let config = EngineConfig::from_json(r#"{ "expression": { "errorPolicy": "failClosed" } }"#).unwrap();
//! assert_eq!(config.expression.error_policy, ErrorPolicy::FailClosed);
//! assert_eq!(config.render.placeholder, "-");
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::render::lookup::{default_display_fields, default_routes, DisplayKey};

/// What a visibility or validation-rule check does when its expression
/// fails to parse or evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorPolicy {
    /// Treat the field as visible and the rule as passing
    #[default]
    FailOpen,
    /// Treat the field as hidden and the rule as failing
    FailClosed,
}

/// Configuration for the expression engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpressionConfig {
    /// Maximum number of cached ASTs; `None` means unbounded
    pub cache_capacity: Option<usize>,
    pub error_policy: ErrorPolicy,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: Some(4096),
            error_policy: ErrorPolicy::FailOpen,
        }
    }
}

/// Configuration for display rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Text shown for null, missing and empty values
    pub placeholder: String,
    /// Object API name to route prefix, e.g. `Account` → `/accounts`
    pub routes: HashMap<String, String>,
    /// Object API name to the ordered keys tried for a lookup label
    pub display_fields: HashMap<String, Vec<DisplayKey>>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            placeholder: "-".to_string(),
            routes: default_routes(),
            display_fields: default_display_fields(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub expression: ExpressionConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_unbounded_cache() {
        let config =
            EngineConfig::from_json(r#"{ "expression": { "cacheCapacity": null } }"#).unwrap();
        assert_eq!(config.expression.cache_capacity, None);
        assert_eq!(config.expression.error_policy, ErrorPolicy::FailOpen);
    }

    #[test]
    fn test_route_override_replaces_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "render": { "routes": { "Deal": "/pipeline" } } }"#)
                .unwrap();
        assert_eq!(config.render.routes.get("Deal").map(String::as_str), Some("/pipeline"));
        assert!(config.render.routes.get("Account").is_none());
    }
}
