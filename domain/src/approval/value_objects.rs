//! Approval decision and session memory value objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a pending approval was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// The user approved this call.
    Approved,
    /// The user denied this call.
    Denied,
    /// The prompt was dismissed (Esc, cancellation). Treated as a denial.
    Dismissed,
    /// An allow rule matched; no prompt was shown.
    AutoApproved,
    /// A deny rule matched; no prompt was shown.
    AutoDenied,
    /// The tool name was already in the session approval memory.
    SessionApproved,
}

impl ApprovalAction {
    /// Whether the call proceeds to execution.
    pub fn is_approval(&self) -> bool {
        matches!(
            self,
            ApprovalAction::Approved
                | ApprovalAction::AutoApproved
                | ApprovalAction::SessionApproved
        )
    }
}

/// Append-only audit record of one approval decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub request_id: String,
    /// Disambiguated tool name.
    pub tool_name: String,
    pub provider_id: String,
    pub action: ApprovalAction,
    pub remember_for_session: bool,
    pub decided_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalDecision {
    pub fn new(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        provider_id: impl Into<String>,
        action: ApprovalAction,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            provider_id: provider_id.into(),
            action,
            remember_for_session: false,
            decided_at: Utc::now(),
            reason: None,
        }
    }

    pub fn remembered(mut self) -> Self {
        self.remember_for_session = true;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Ephemeral, per-conversation record of tool names the user pre-approved
/// with "remember for this session".
///
/// Membership is by disambiguated tool name only — arguments are never
/// considered. Cleared when the session ends; never persisted.
#[derive(Debug, Clone)]
pub struct SessionApprovalMemory {
    session_id: String,
    approved_tool_names: HashSet<String>,
}

impl SessionApprovalMemory {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            approved_tool_names: HashSet::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn remember(&mut self, tool_name: impl Into<String>) {
        self.approved_tool_names.insert(tool_name.into());
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.approved_tool_names.contains(tool_name)
    }

    pub fn approved_tool_names(&self) -> impl Iterator<Item = &str> {
        self.approved_tool_names.iter().map(|s| s.as_str())
    }

    pub fn clear(&mut self) {
        self.approved_tool_names.clear();
    }
}
