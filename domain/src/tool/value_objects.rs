//! Tool domain value objects — immutable result types
//!
//! Every tool call that reaches a terminal state produces exactly one
//! [`ToolResult`], created either by the executor (real outcome) or by the
//! approval gate (synthetic denial). Failures are values here, never
//! panics — the orchestration loop renders any outcome into model-facing
//! text and the conversation continues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One block of tool output content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolContent {
    /// Plain text.
    Text { text: String },
    /// Structured JSON (e.g. an embedded resource).
    Json { value: serde_json::Value },
    /// Binary image payload.
    Image {
        data: Vec<u8>,
        mime_type: String,
    },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::Json { value }
    }

    /// Render this block as model-facing text.
    pub fn as_model_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Json { value } => {
                serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
            }
            Self::Image { data, mime_type } => {
                format!("[image: {} ({} bytes)]", mime_type, data.len())
            }
        }
    }
}

/// Terminal outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The provider executed the call and returned content.
    Success { content: Vec<ToolContent> },
    /// The call failed — provider-reported error, timeout, or transport
    /// failure. `retryable` follows the provider hint where one exists;
    /// timeouts are always retryable.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        retryable: bool,
    },
    /// The user (or a deny rule) refused the call. Not an error: the model
    /// is expected to react to the refusal, not retry it.
    Denied { reason: String },
}

impl ToolOutcome {
    pub fn success_text(text: impl Into<String>) -> Self {
        Self::Success {
            content: vec![ToolContent::text(text)],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
            retryable: false,
        }
    }

    pub fn retryable_error(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: Some(code.into()),
            retryable: true,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

/// Result of a tool call, paired one-to-one with its [`ToolCall`].
///
/// [`ToolCall`]: crate::tool::entities::ToolCall
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this result answers.
    pub call_id: String,
    /// Disambiguated tool name.
    pub tool_name: String,
    pub outcome: ToolOutcome,
    /// Wall-clock execution time. Zero for synthetic results.
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl ToolResult {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, outcome: ToolOutcome) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            outcome,
            duration_ms: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Synthetic denial result fabricated by the approval gate.
    pub fn denied(call_id: impl Into<String>, tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(call_id, tool_name, ToolOutcome::Denied { reason: reason.into() })
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Human-readable rendering fed back to the model.
    ///
    /// Always a plain string, for every outcome, so the conversation can
    /// continue after any failure.
    pub fn model_text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { content } => content
                .iter()
                .map(ToolContent::as_model_text)
                .collect::<Vec<_>>()
                .join("\n"),
            ToolOutcome::Error { message, code, .. } => match code {
                Some(code) => format!("Tool call failed ({}): {}", code, message),
                None => format!("Tool call failed: {}", message),
            },
            ToolOutcome::Denied { reason } => format!("Tool call denied: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_renders_content_blocks() {
        let result = ToolResult::new(
            "c1",
            "github_mcp_search_issues",
            ToolOutcome::Success {
                content: vec![
                    ToolContent::text("3 issues found"),
                    ToolContent::json(serde_json::json!({"total": 3})),
                ],
            },
        );
        assert!(result.is_success());
        assert_eq!(result.model_text(), "3 issues found\n{\"total\":3}");
    }

    #[test]
    fn error_rendering_includes_code() {
        let result = ToolResult::new(
            "c2",
            "t",
            ToolOutcome::retryable_error("no response within 30s", "timeout"),
        );
        assert_eq!(
            result.model_text(),
            "Tool call failed (timeout): no response within 30s"
        );
        assert!(matches!(
            result.outcome,
            ToolOutcome::Error { retryable: true, .. }
        ));
    }

    #[test]
    fn denial_is_distinguishable_and_not_an_error() {
        let result = ToolResult::denied("c3", "jira_mcp_delete_issue", "denied by the user");
        assert!(!result.is_success());
        assert!(result.outcome.is_denied());
        assert_eq!(
            result.model_text(),
            "Tool call denied: denied by the user"
        );
    }

    #[test]
    fn image_content_renders_placeholder_text() {
        let block = ToolContent::Image {
            data: vec![0u8; 128],
            mime_type: "image/png".to_string(),
        };
        assert_eq!(block.as_model_text(), "[image: image/png (128 bytes)]");
    }
}
