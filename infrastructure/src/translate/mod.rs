//! Schema translator — one canonical tool definition, many LLM dialects.
//!
//! Stateless, pure functions: [`to_vendor_format`] renders the registry's
//! canonical [`ToolSchema`] into a vendor's function-calling wire format,
//! and [`parse_vendor_call`] turns a vendor's raw tool-call payload back
//! into a canonical [`ToolCall`]. Parsing resolves tools strictly by
//! disambiguated name: a name the registry does not know fails closed with
//! [`TranslateError::UnknownTool`] — never a guess, never a provider RPC.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value, json};
use thiserror::Error;

use switchboard_domain::{Tool, ToolCall, ToolSchema};

/// Counter for call ids in dialects that do not supply one.
static GENERATED_CALL_ID: AtomicU64 = AtomicU64::new(1);

fn next_call_id() -> String {
    format!("call-{}", GENERATED_CALL_ID.fetch_add(1, Ordering::SeqCst))
}

/// Supported function-calling dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    /// `tools` entries with `input_schema`; calls are `tool_use` blocks.
    Anthropic,
    /// `function` wrappers with `parameters`; call arguments arrive
    /// JSON-encoded as a string.
    OpenAi,
    /// `functionDeclarations` with uppercased primitive type names; calls
    /// are `functionCall` objects without ids.
    Gemini,
}

impl std::str::FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Vendor::Anthropic),
            "openai" | "gpt" => Ok(Vendor::OpenAi),
            "gemini" | "google" => Ok(Vendor::Gemini),
            other => Err(format!("unknown vendor: {}", other)),
        }
    }
}

/// Error type for translation failures. Always fail-closed: a failed
/// translation never reaches a provider.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("No tool named `{name}` in the registry")]
    UnknownTool { name: String },

    #[error("Malformed vendor call: {0}")]
    MalformedCall(String),
}

/// Render the tool catalog in a vendor's wire format.
///
/// The canonical schemas are only read; nothing is mutated.
pub fn to_vendor_format(vendor: Vendor, tools: &[Tool]) -> Value {
    match vendor {
        Vendor::Anthropic => Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description.clone().unwrap_or_default(),
                        "input_schema": t.input_schema.to_json(),
                    })
                })
                .collect(),
        ),
        Vendor::OpenAi => Value::Array(
            tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description.clone().unwrap_or_default(),
                            "parameters": t.input_schema.to_json(),
                        }
                    })
                })
                .collect(),
        ),
        Vendor::Gemini => json!({
            "functionDeclarations": tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description.clone().unwrap_or_default(),
                        "parameters": gemini_schema(&t.input_schema),
                    })
                })
                .collect::<Vec<_>>(),
        }),
    }
}

/// Gemini's schema dialect: primitive type names are uppercased and the
/// string-constraint keywords it does not accept are omitted.
fn gemini_schema(schema: &ToolSchema) -> Value {
    let mut out = Map::new();
    out.insert(
        "type".to_string(),
        Value::String(schema.schema_type.to_ascii_uppercase()),
    );
    if let Some(description) = &schema.description {
        out.insert("description".to_string(), Value::String(description.clone()));
    }
    if !schema.enum_values.is_empty() {
        out.insert("enum".to_string(), Value::Array(schema.enum_values.clone()));
    }
    if !schema.properties.is_empty() {
        let properties: Map<String, Value> = schema
            .properties
            .iter()
            .map(|(name, prop)| (name.clone(), gemini_schema(prop)))
            .collect();
        out.insert("properties".to_string(), Value::Object(properties));
    }
    if !schema.required.is_empty() {
        out.insert(
            "required".to_string(),
            Value::Array(schema.required.iter().cloned().map(Value::String).collect()),
        );
    }
    if let Some(items) = &schema.items {
        out.insert("items".to_string(), gemini_schema(items));
    }
    Value::Object(out)
}

/// Parse a vendor's raw tool-call payload into a canonical [`ToolCall`].
pub fn parse_vendor_call(
    vendor: Vendor,
    raw: &Value,
    tools: &[Tool],
) -> Result<ToolCall, TranslateError> {
    let (id, name, arguments) = match vendor {
        Vendor::Anthropic => {
            let name = str_field(raw, "name")?;
            let id = raw
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(next_call_id);
            let arguments = object_field(raw.get("input"))?;
            (id, name, arguments)
        }
        Vendor::OpenAi => {
            let function = raw
                .get("function")
                .ok_or_else(|| TranslateError::MalformedCall("missing `function`".into()))?;
            let name = str_field(function, "name")?;
            let id = raw
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(next_call_id);
            // Arguments arrive JSON-encoded as a string; tolerate an
            // already-decoded object too.
            let arguments = match function.get("arguments") {
                Some(Value::String(s)) if !s.trim().is_empty() => {
                    let decoded: Value = serde_json::from_str(s).map_err(|e| {
                        TranslateError::MalformedCall(format!("undecodable arguments: {}", e))
                    })?;
                    object_field(Some(&decoded))?
                }
                Some(Value::String(_)) | None => Map::new(),
                other => object_field(other)?,
            };
            (id, name, arguments)
        }
        Vendor::Gemini => {
            let call = raw
                .get("functionCall")
                .ok_or_else(|| TranslateError::MalformedCall("missing `functionCall`".into()))?;
            let name = str_field(call, "name")?;
            let arguments = object_field(call.get("args"))?;
            (next_call_id(), name, arguments)
        }
    };

    let tool = tools
        .iter()
        .find(|t| t.name == name)
        .ok_or(TranslateError::UnknownTool { name })?;
    Ok(ToolCall::new(id, tool, arguments))
}

fn str_field(value: &Value, field: &str) -> Result<String, TranslateError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| TranslateError::MalformedCall(format!("missing `{}`", field)))
}

fn object_field(value: Option<&Value>) -> Result<Map<String, Value>, TranslateError> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(TranslateError::MalformedCall(format!(
            "arguments must be an object, got {}",
            other
        ))),
    }
}
