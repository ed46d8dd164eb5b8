//! Application layer for switchboard
//!
//! This crate contains the use cases and port definitions of the
//! tool-invocation engine: the approval gate, the executor, and the
//! orchestration loop. It depends only on the domain layer.

pub mod approval;
pub mod executor;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use approval::{ApprovalGate, ApprovalVerdict, DecisionAction};
pub use executor::{DEFAULT_CALL_TIMEOUT, Executor};
pub use ports::{
    approval_prompt::{ApprovalPrompt, NoApprovalPrompt, PendingApproval},
    model_gateway::{GatewayError, ModelGateway},
    progress::{NoTurnProgress, TurnProgress},
    tool_invoker::ToolInvoker,
};
pub use use_cases::run_turn::{
    DEFAULT_MAX_ROUNDS, RunTurnInput, RunTurnOutput, RunTurnUseCase, TurnError, TurnOutcome,
};
