//! Turn progress port
//!
//! UI-facing notifications emitted while a turn runs. All methods have
//! empty defaults so adapters implement only what they render.

use switchboard_domain::{ToolCall, ToolResult, TurnPhase};

/// Port for observing turn execution progress.
pub trait TurnProgress: Send + Sync {
    /// The turn moved to a new phase.
    fn on_phase(&self, _round: usize, _phase: TurnPhase) {}

    /// A cleared call was dispatched to its provider.
    fn on_call_started(&self, _call: &ToolCall) {}

    /// A call reached its terminal result (executed, denied, or synthetic).
    fn on_call_finished(&self, _result: &ToolResult) {}

    /// A round closed with all results accounted for.
    fn on_round_closed(&self, _round: usize, _results: &[ToolResult]) {}
}

/// No-op progress notifier.
pub struct NoTurnProgress;

impl TurnProgress for NoTurnProgress {}
