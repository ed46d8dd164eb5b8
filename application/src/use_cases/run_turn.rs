//! Run-turn use case — the multi-round tool orchestration loop.
//!
//! Drives one conversational turn: the model requests tool calls, the
//! registry resolves them, the approval gate clears or rejects them, the
//! executor runs what was cleared, results are fed back, and the cycle
//! repeats until the model answers without tool calls or the round limit is
//! reached. Every round's (calls, results) pair is recorded so callers can
//! reconstruct the full tool-use transcript.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchboard_domain::{
    ApprovalRule, ExecutionRound, ModelTurn, RequestedCall, SessionApprovalMemory, ToolCall,
    ToolOutcome, ToolResult, ToolResultForModel, TurnPhase,
};

use crate::approval::ApprovalGate;
use crate::executor::Executor;
use crate::ports::model_gateway::{GatewayError, ModelGateway};
use crate::ports::progress::{NoTurnProgress, TurnProgress};
use crate::ports::tool_invoker::ToolInvoker;

/// Default bound on tool rounds within one turn.
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// Error type for the run-turn use case.
///
/// Only model-gateway failures surface as `Err` — everything on the tool
/// side (denials, timeouts, unknown tools, cancellation) is data inside
/// [`RunTurnOutput`].
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Model gateway failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// How the turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a turn with no tool calls.
    Completed,
    /// The configured round limit was reached; the final text is a
    /// synthetic limit notice.
    RoundLimitReached,
    /// The caller cancelled the turn.
    Cancelled,
}

/// Input for one turn.
pub struct RunTurnInput {
    pub request: String,
    pub rules: Vec<ApprovalRule>,
    pub cancel: CancellationToken,
}

impl RunTurnInput {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            rules: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<ApprovalRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Output of one turn: final text plus the complete round transcript.
#[derive(Debug)]
pub struct RunTurnOutput {
    pub outcome: TurnOutcome,
    pub final_text: String,
    pub rounds: Vec<ExecutionRound>,
}

/// The orchestration loop.
pub struct RunTurnUseCase {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<dyn ToolInvoker>,
    gate: Arc<ApprovalGate>,
    executor: Executor,
    progress: Arc<dyn TurnProgress>,
    max_rounds: usize,
}

impl RunTurnUseCase {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<dyn ToolInvoker>,
        gate: Arc<ApprovalGate>,
        executor: Executor,
    ) -> Self {
        Self {
            gateway,
            tools,
            gate,
            executor,
            progress: Arc::new(NoTurnProgress),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn TurnProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Run one turn to completion.
    ///
    /// `memory` is the session's approval memory; it outlives the turn and
    /// is mutated only here, through the gate.
    pub async fn execute(
        &self,
        input: RunTurnInput,
        memory: &mut SessionApprovalMemory,
    ) -> Result<RunTurnOutput, TurnError> {
        let catalog = self.tools.catalog();
        info!(tools = catalog.len(), "Starting turn");
        self.progress.on_phase(0, TurnPhase::AwaitingModel);

        let mut turn = self.gateway.start_turn(&input.request, &catalog).await?;
        let mut rounds: Vec<ExecutionRound> = Vec::new();

        for round_no in 1usize.. {
            if turn.is_final() {
                self.progress.on_phase(round_no, TurnPhase::Done);
                return Ok(RunTurnOutput {
                    outcome: TurnOutcome::Completed,
                    final_text: turn.text,
                    rounds,
                });
            }

            if round_no > self.max_rounds {
                warn!(max_rounds = self.max_rounds, "Turn hit the round limit");
                self.progress.on_phase(round_no, TurnPhase::Done);
                return Ok(RunTurnOutput {
                    outcome: TurnOutcome::RoundLimitReached,
                    final_text: format!(
                        "Stopped after {} tool rounds without a final answer.",
                        self.max_rounds
                    ),
                    rounds,
                });
            }

            self.progress.on_phase(round_no, TurnPhase::ModelRequestedTools);
            let requested = std::mem::take(&mut turn.requested_calls);
            debug!(round = round_no, calls = requested.len(), "Model requested tools");

            // Resolve against the registry. Unknown names fail closed: a
            // synthetic result, no provider RPC.
            let mut resolved: Vec<ToolCall> = Vec::new();
            let mut synthetic: Vec<ToolResult> = Vec::new();
            for req in requested {
                match self.resolve(&req) {
                    Some(call) => resolved.push(call),
                    None => {
                        warn!(tool = %req.tool_name, "Model requested unknown tool");
                        synthetic.push(ToolResult::new(
                            &req.id,
                            &req.tool_name,
                            ToolOutcome::Error {
                                message: format!(
                                    "no tool named `{}` is available",
                                    req.tool_name
                                ),
                                code: Some("tool_not_found".to_string()),
                                retryable: false,
                            },
                        ));
                    }
                }
            }

            self.progress.on_phase(round_no, TurnPhase::AwaitingApproval);
            let verdict = self
                .gate
                .request_approval(resolved.clone(), memory, &input.rules, &input.cancel)
                .await;

            self.progress.on_phase(round_no, TurnPhase::Executing);
            let executed = self
                .executor
                .execute(verdict.approved, &input.cancel)
                .await;

            // One result per requested call: executed, denied, or synthetic.
            let mut results = synthetic;
            results.extend(verdict.rejections);
            results.extend(executed);
            let round = ExecutionRound::new(resolved, results);
            self.progress.on_round_closed(round_no, &round.results);
            rounds.push(round);

            if input.cancel.is_cancelled() {
                info!(round = round_no, "Turn cancelled");
                self.progress.on_phase(round_no, TurnPhase::Done);
                return Ok(RunTurnOutput {
                    outcome: TurnOutcome::Cancelled,
                    final_text: "The turn was cancelled before completion.".to_string(),
                    rounds,
                });
            }

            self.progress.on_phase(round_no, TurnPhase::FeedingResultsBack);
            let for_model: Vec<ToolResultForModel> = rounds
                .last()
                .map(|r| r.results.iter().map(ToolResultForModel::from_result).collect())
                .unwrap_or_default();

            self.progress.on_phase(round_no, TurnPhase::AwaitingModel);
            turn = self.gateway.continue_turn(&for_model).await?;
        }

        unreachable!("round loop always returns");
    }

    fn resolve(&self, req: &RequestedCall) -> Option<ToolCall> {
        let tool = self.tools.lookup(&req.tool_name)?;
        Some(ToolCall::new(&req.id, &tool, req.arguments.clone()))
    }
}
