//! JSON-RPC 2.0 message types for provider communication.
//!
//! One JSON object per frame. Reserved methods: `initialize`,
//! `notifications/initialized`, `ping`, `tools/list`, `tools/call`.
//!
//! # Message shapes
//!
//! - **Request**: `id` + `method` (+ `params`)
//! - **Response**: `id` + `result` or `error`
//! - **Notification**: `method` without `id`

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

use switchboard_domain::ToolContent;

/// Protocol revision sent during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Reserved method names.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC notification (no id, no response expected)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response
///
/// `id` stays a raw value: JSON-RPC allows string or number ids, and a
/// provider echoing ours back as a string must still correlate.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcErrorObject>,
}

impl JsonRpcResponse {
    /// The response id as u64, accepting both numeric and numeric-string ids.
    pub fn id_as_u64(&self) -> Option<u64> {
        match self.id.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[allow(dead_code)]
    pub data: Option<serde_json::Value>,
}

/// Classification of an incoming frame.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// A response to a request we sent (has `id`, no `method`).
    Response,
    /// A request from the provider (has `id` + `method`), e.g. `ping`.
    IncomingRequest { id: u64, method: String },
    /// A notification (has `method`, no `id`).
    Notification { method: String },
    /// Neither id nor method — malformed but not fatal.
    Unrecognized,
}

/// Classify a frame by inspecting its `id` and `method` fields.
pub fn classify_message(json: &serde_json::Value) -> MessageKind {
    let id = json.get("id").and_then(|v| v.as_u64());
    let method = json.get("method").and_then(|v| v.as_str());

    match (id, method) {
        (Some(id), Some(method)) => MessageKind::IncomingRequest {
            id,
            method: method.to_string(),
        },
        (_, None) if json.get("id").is_some() => MessageKind::Response,
        (None, Some(method)) => MessageKind::Notification {
            method: method.to_string(),
        },
        _ => MessageKind::Unrecognized,
    }
}

/// Client identity sent in the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// `initialize` request params.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: serde_json::Value,
    pub client_info: Implementation,
}

impl InitializeParams {
    pub fn current() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: Implementation {
                name: "switchboard".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// `initialize` response payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
    #[serde(default)]
    pub server_info: Option<Implementation>,
}

/// One tool entry from `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
}

/// `tools/list` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<WireTool>,
}

/// `tools/call` request params.
#[derive(Debug, Clone, Serialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One content block of a `tools/call` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireContent {
    Text {
        text: String,
    },
    Image {
        /// Base64-encoded payload.
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

impl WireContent {
    /// Convert to the domain content type, decoding image payloads.
    pub fn into_tool_content(self) -> Option<ToolContent> {
        match self {
            WireContent::Text { text } => Some(ToolContent::Text { text }),
            WireContent::Image { data, mime_type } => {
                match base64::engine::general_purpose::STANDARD.decode(&data) {
                    Ok(bytes) => Some(ToolContent::Image {
                        data: bytes,
                        mime_type,
                    }),
                    Err(e) => {
                        warn!(error = %e, "Dropping image block with invalid base64");
                        Some(ToolContent::text("[image with invalid encoding]"))
                    }
                }
            }
            WireContent::Resource { resource } => Some(ToolContent::Json { value: resource }),
            WireContent::Unknown => None,
        }
    }
}

/// `tools/call` response payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<WireContent>,
    #[serde(default)]
    pub is_error: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_response() {
        let json = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {}});
        assert_eq!(classify_message(&json), MessageKind::Response);
    }

    #[test]
    fn classify_incoming_request() {
        let json = serde_json::json!({"jsonrpc": "2.0", "id": 3, "method": "ping"});
        assert_eq!(
            classify_message(&json),
            MessageKind::IncomingRequest {
                id: 3,
                method: "ping".to_string()
            }
        );
    }

    #[test]
    fn classify_notification() {
        let json = serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert_eq!(
            classify_message(&json),
            MessageKind::Notification {
                method: "notifications/initialized".to_string()
            }
        );
    }

    #[test]
    fn classify_unrecognized() {
        let json = serde_json::json!({"data": "something"});
        assert_eq!(classify_message(&json), MessageKind::Unrecognized);
    }

    #[test]
    fn request_serializes_with_version_tag() {
        let request = JsonRpcRequest::new(
            5,
            methods::TOOLS_CALL,
            Some(serde_json::json!({"name": "search_issues", "arguments": {}})),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 5);
        assert_eq!(json["method"], "tools/call");
    }

    #[test]
    fn notification_omits_id() {
        let n = JsonRpcNotification::new(methods::INITIALIZED, None);
        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("params").is_none());
    }

    #[test]
    fn response_id_accepts_string_and_number() {
        let numeric: JsonRpcResponse =
            serde_json::from_value(serde_json::json!({"id": 9, "result": {}})).unwrap();
        assert_eq!(numeric.id_as_u64(), Some(9));

        let stringy: JsonRpcResponse =
            serde_json::from_value(serde_json::json!({"id": "9", "result": {}})).unwrap();
        assert_eq!(stringy.id_as_u64(), Some(9));
    }

    #[test]
    fn initialize_params_use_camel_case() {
        let json = serde_json::to_value(InitializeParams::current()).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["clientInfo"]["name"], "switchboard");
    }

    #[test]
    fn wire_tool_reads_input_schema_field() {
        let result: ListToolsResult = serde_json::from_value(serde_json::json!({
            "tools": [{
                "name": "search_issues",
                "description": "Search issues",
                "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
            }]
        }))
        .unwrap();
        assert_eq!(result.tools[0].name, "search_issues");
        assert!(result.tools[0].input_schema.is_some());
    }

    #[test]
    fn content_blocks_decode() {
        let text: WireContent =
            serde_json::from_value(serde_json::json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(
            text.into_tool_content(),
            Some(ToolContent::text("hi"))
        );

        let image: WireContent = serde_json::from_value(serde_json::json!({
            "type": "image", "data": "aGVsbG8=", "mimeType": "image/png"
        }))
        .unwrap();
        match image.into_tool_content().unwrap() {
            ToolContent::Image { data, mime_type } => {
                assert_eq!(data, b"hello");
                assert_eq!(mime_type, "image/png");
            }
            other => panic!("expected image, got {:?}", other),
        }

        let unknown: WireContent =
            serde_json::from_value(serde_json::json!({"type": "audio", "data": "x"})).unwrap();
        assert!(unknown.into_tool_content().is_none());
    }

    #[test]
    fn call_result_error_flag_defaults_false() {
        let result: CallToolResult = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "boom"}],
            "isError": true
        }))
        .unwrap();
        assert_eq!(result.is_error, Some(true));

        let ok: CallToolResult =
            serde_json::from_value(serde_json::json!({"content": []})).unwrap();
        assert_eq!(ok.is_error, None);
    }
}
