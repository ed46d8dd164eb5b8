//! Tool domain entities

use crate::core::slug::slug;
use crate::tool::schema::ToolSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// A tool discovered from a connected provider.
///
/// Identity is `(provider_id, original_name)`. The registry-facing identity
/// is [`name`](Self::name), the disambiguated name derived from the
/// provider's display name, globally unique within a registry. A `Tool`
/// lives exactly as long as its provider connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Disambiguated name: `slug(provider_display_name) + "_" + original_name`.
    pub name: String,
    /// Provider the tool belongs to.
    pub provider_id: String,
    /// Provider display name the prefix was derived from.
    pub provider_display_name: String,
    /// Name the provider knows the tool by.
    pub original_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Input schema as discovered. Immutable.
    pub input_schema: ToolSchema,
}

impl Tool {
    pub fn new(
        provider_id: impl Into<String>,
        provider_display_name: impl Into<String>,
        original_name: impl Into<String>,
        description: Option<String>,
        input_schema: ToolSchema,
    ) -> Self {
        let provider_id = provider_id.into();
        let provider_display_name = provider_display_name.into();
        let original_name = original_name.into();
        let name = disambiguated_name(&provider_display_name, &original_name);
        Self {
            name,
            provider_id,
            provider_display_name,
            original_name,
            description,
            input_schema,
        }
    }

    /// Replace the disambiguated name with a further-qualified variant.
    ///
    /// Used by the registry when two providers' display names slug to the
    /// same prefix and their tool names collide.
    pub fn qualified_with_provider_id(mut self) -> Self {
        self.name = format!(
            "{}_{}_{}",
            slug(&self.provider_display_name),
            slug(&self.provider_id),
            self.original_name
        );
        self
    }
}

/// Compute the disambiguated name for a provider display name + tool name.
pub fn disambiguated_name(provider_display_name: &str, original_name: &str) -> String {
    let prefix = slug(provider_display_name);
    if prefix.is_empty() {
        original_name.to_string()
    } else {
        format!("{}_{}", prefix, original_name)
    }
}

/// A resolved request to invoke one tool.
///
/// Created when the model emits a function call and the name resolves in the
/// registry; consumed by the approval gate and the executor. Never mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque call id — vendor-supplied when the dialect carries one,
    /// generated otherwise.
    pub id: String,
    /// Disambiguated tool name.
    pub name: String,
    pub provider_id: String,
    pub original_name: String,
    /// Arguments as a JSON object.
    pub arguments: Map<String, serde_json::Value>,
    pub requested_at: DateTime<Utc>,
}

impl ToolCall {
    /// Build a call against a registered tool.
    pub fn new(
        id: impl Into<String>,
        tool: &Tool,
        arguments: Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: tool.name.clone(),
            provider_id: tool.provider_id.clone(),
            original_name: tool.original_name.clone(),
            arguments,
            requested_at: Utc::now(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Get a string argument
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional i64 argument
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.arguments.get(key).and_then(|v| v.as_i64())
    }

    /// Get an optional bool argument
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.arguments.get(key).and_then(|v| v.as_bool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(provider: &str, display: &str, name: &str) -> Tool {
        Tool::new(provider, display, name, None, ToolSchema::object())
    }

    #[test]
    fn disambiguated_name_prefixes_display_name_slug() {
        let t = tool("github-mcp", "github-mcp", "search_issues");
        assert_eq!(t.name, "github_mcp_search_issues");
    }

    #[test]
    fn empty_slug_falls_back_to_original_name() {
        let t = tool("p1", "---", "search");
        assert_eq!(t.name, "search");
    }

    #[test]
    fn qualification_inserts_provider_id() {
        let t = tool("east", "Search", "find").qualified_with_provider_id();
        assert_eq!(t.name, "search_east_find");
    }

    #[test]
    fn tool_call_accessors() {
        let t = tool("github-mcp", "github-mcp", "search_issues");
        let call = ToolCall::new("call-1", &t, Map::new())
            .with_arg("query", "is:open")
            .with_arg("limit", 10)
            .with_arg("include_closed", false);

        assert_eq!(call.name, "github_mcp_search_issues");
        assert_eq!(call.original_name, "search_issues");
        assert_eq!(call.get_string("query"), Some("is:open"));
        assert_eq!(call.get_i64("limit"), Some(10));
        assert_eq!(call.get_bool("include_closed"), Some(false));
        assert_eq!(call.get_string("missing"), None);
    }
}
