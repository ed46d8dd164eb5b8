//! Canonical tool input schema.
//!
//! Providers describe tool inputs with a JSON Schema subset. The structure is
//! recursive: an object schema carries named property schemas, an array schema
//! carries an item schema, and leaves carry the usual string/number constraint
//! keywords. A [`ToolSchema`] is immutable once discovered — translators copy,
//! never mutate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node in the canonical schema tree.
///
/// Field names follow JSON Schema, so a provider's `inputSchema` value
/// deserializes directly into this type. Unknown keywords are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Schema type: "object", "array", "string", "number", "integer",
    /// "boolean", or "null".
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Property schemas for `"object"` nodes. BTreeMap keeps vendor output
    /// deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ToolSchema>,

    /// Names of required properties for `"object"` nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Allowed values for enum-constrained leaves.
    #[serde(
        rename = "enum",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub enum_values: Vec<serde_json::Value>,

    /// Item schema for `"array"` nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self::object()
    }
}

impl ToolSchema {
    /// An empty `"object"` schema (the shape of a tool taking no arguments).
    pub fn object() -> Self {
        Self {
            schema_type: default_schema_type(),
            description: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            enum_values: Vec::new(),
            items: None,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// A leaf schema of the given type.
    pub fn of_type(schema_type: impl Into<String>) -> Self {
        Self {
            schema_type: schema_type.into(),
            ..Self::object()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: ToolSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    pub fn with_items(mut self, items: ToolSchema) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn is_object(&self) -> bool {
        self.schema_type == "object"
    }

    /// Depth of the schema tree (a leaf is 1). Useful for sanity limits on
    /// provider-supplied schemas.
    pub fn depth(&self) -> usize {
        let child_depth = self
            .properties
            .values()
            .map(ToolSchema::depth)
            .chain(self.items.as_deref().map(ToolSchema::depth))
            .max()
            .unwrap_or(0);
        1 + child_depth
    }

    /// Parse a provider-supplied `inputSchema` JSON value.
    ///
    /// A missing or null value yields the empty object schema (tools with no
    /// arguments frequently omit the field entirely).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::object());
        }
        serde_json::from_value(value.clone())
    }

    /// Render back to a JSON Schema value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }
}
