//! Orchestration domain entities
//!
//! The turn loop's vocabulary: what the model asks for, what comes back,
//! and the per-round pairing that forms the tool-use transcript.

use serde::{Deserialize, Serialize};

use crate::tool::entities::ToolCall;
use crate::tool::value_objects::ToolResult;

/// A tool call as requested by the model, before registry resolution.
///
/// `tool_name` is whatever the model emitted — usually a disambiguated name,
/// sometimes a hallucination that resolves to nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedCall {
    /// Vendor-supplied call id (or generated by the dialect parser).
    pub id: String,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// One normalized model turn, as delivered by the model gateway.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Assistant text emitted this turn (may be empty when the model goes
    /// straight to tool calls).
    pub text: String,
    pub requested_calls: Vec<RequestedCall>,
}

impl ModelTurn {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            requested_calls: Vec::new(),
        }
    }

    pub fn is_final(&self) -> bool {
        self.requested_calls.is_empty()
    }
}

/// A tool result rendered for the model, keyed by the vendor call id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultForModel {
    pub call_id: String,
    pub content: String,
}

impl ToolResultForModel {
    pub fn from_result(result: &ToolResult) -> Self {
        Self {
            call_id: result.call_id.clone(),
            content: result.model_text(),
        }
    }
}

/// One round of the turn loop: the calls the model requested and their
/// terminal results.
///
/// Invariant: a round is closed only when `results` holds exactly one entry
/// per requested call — executed, denied, or synthesized (unknown tool,
/// cancellation). Nothing is silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRound {
    pub tool_calls: Vec<ToolCall>,
    pub results: Vec<ToolResult>,
}

impl ExecutionRound {
    pub fn new(tool_calls: Vec<ToolCall>, results: Vec<ToolResult>) -> Self {
        Self {
            tool_calls,
            results,
        }
    }

    /// Whether every call has reached its terminal result.
    pub fn is_closed(&self) -> bool {
        self.tool_calls.len() <= self.results.len()
    }
}

/// Phase of a conversational turn, for progress reporting and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    AwaitingModel,
    ModelRequestedTools,
    AwaitingApproval,
    Executing,
    FeedingResultsBack,
    Done,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnPhase::AwaitingModel => "awaiting_model",
            TurnPhase::ModelRequestedTools => "model_requested_tools",
            TurnPhase::AwaitingApproval => "awaiting_approval",
            TurnPhase::Executing => "executing",
            TurnPhase::FeedingResultsBack => "feeding_results_back",
            TurnPhase::Done => "done",
        };
        write!(f, "{}", s)
    }
}
