//! Approval prompt port
//!
//! When the gate cannot resolve a call from rules or session memory, it
//! parks the call in its pending map and notifies the decision-maker through
//! this port. The adapter (CLI prompt, desktop dialog, test harness) later
//! answers via [`ApprovalGate::decide`] or [`ApprovalGate::decide_all`] —
//! the notification itself never blocks.
//!
//! [`ApprovalGate::decide`]: crate::approval::ApprovalGate::decide
//! [`ApprovalGate::decide_all`]: crate::approval::ApprovalGate::decide_all

use serde_json::Map;
use tracing::warn;

/// One call awaiting an external decision.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    /// Key for [`decide`](crate::approval::ApprovalGate::decide).
    pub request_id: String,
    /// Round the call belongs to, for
    /// [`decide_all`](crate::approval::ApprovalGate::decide_all).
    pub round_id: String,
    /// Disambiguated tool name.
    pub tool_name: String,
    pub provider_id: String,
    pub arguments: Map<String, serde_json::Value>,
}

/// Port notifying an external decision-maker of pending approvals.
pub trait ApprovalPrompt: Send + Sync {
    /// A batch of calls entered the pending state.
    ///
    /// Implementations must return promptly; rendering and user interaction
    /// happen elsewhere.
    fn on_approval_required(&self, round_id: &str, pending: &[PendingApproval]);
}

/// Prompt that only logs. Pending calls stay suspended until some other
/// holder of the gate handle decides them — useful for headless embedding
/// where decisions arrive over an API.
pub struct NoApprovalPrompt;

impl ApprovalPrompt for NoApprovalPrompt {
    fn on_approval_required(&self, round_id: &str, pending: &[PendingApproval]) {
        warn!(
            round_id,
            pending = pending.len(),
            "Approval required but no prompt is attached; calls remain pending"
        );
    }
}
