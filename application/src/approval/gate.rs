//! Approval gate — the human checkpoint between requested and executed calls.
//!
//! Given a batch of tool calls, [`ApprovalGate::request_approval`] returns the
//! subset cleared for execution plus synthetic denial results for the rest.
//! Resolution order per call:
//!
//! 1. Deny rule match → auto-denied (deny always beats allow)
//! 2. Allow rule match → auto-approved
//! 3. Tool name in session memory → session-approved
//! 4. Otherwise the call suspends in the pending-decision map until
//!    [`decide`](ApprovalGate::decide) / [`decide_all`](ApprovalGate::decide_all)
//!    resolves it, or the round is cancelled (→ dismissed)
//!
//! Suspension is cooperative: each pending call holds a `oneshot` resolver
//! in the map, the gate awaits the receivers with no lock held, and an
//! external decision fulfils the sender. There is no timeout — an undecided
//! call waits indefinitely.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use switchboard_domain::{
    ApprovalAction, ApprovalDecision, ApprovalRule, RuleKind, RuleScope, SessionApprovalMemory,
    ToolCall, ToolResult,
};

use crate::ports::approval_prompt::{ApprovalPrompt, PendingApproval};

/// Action taken by the external decision-maker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Approve,
    Deny,
    /// Prompt dismissed without an explicit choice. Treated as a denial.
    Dismiss,
}

/// Outcome of one approval round.
#[derive(Debug)]
pub struct ApprovalVerdict {
    /// Calls cleared for execution, in request order.
    pub approved: Vec<ToolCall>,
    /// Synthetic denial results for everything else.
    pub rejections: Vec<ToolResult>,
}

#[derive(Debug, Clone, Copy)]
struct Resolution {
    action: DecisionAction,
    remember: bool,
}

struct PendingEntry {
    round_id: String,
    tool_name: String,
    provider_id: String,
    resolver: oneshot::Sender<Resolution>,
}

/// The approval gate. One instance per engine; safe to share behind `Arc`.
pub struct ApprovalGate {
    prompt: Arc<dyn ApprovalPrompt>,
    /// request_id → pending entry. Held only for map access, never across
    /// an await.
    pending: Mutex<HashMap<String, PendingEntry>>,
    /// Append-only audit log.
    decisions: Mutex<Vec<ApprovalDecision>>,
    next_request: AtomicU64,
    next_round: AtomicU64,
}

impl ApprovalGate {
    pub fn new(prompt: Arc<dyn ApprovalPrompt>) -> Self {
        Self {
            prompt,
            pending: Mutex::new(HashMap::new()),
            decisions: Mutex::new(Vec::new()),
            next_request: AtomicU64::new(1),
            next_round: AtomicU64::new(1),
        }
    }

    /// Gate one batch of calls.
    ///
    /// Suspends until every call has a decision. Cancelling `cancel`
    /// dismisses whatever is still pending and releases the suspension.
    /// "Remember for session" approvals update `memory` here, in the
    /// round-processing context — never from the decider's task.
    pub async fn request_approval(
        &self,
        calls: Vec<ToolCall>,
        memory: &mut SessionApprovalMemory,
        rules: &[ApprovalRule],
        cancel: &CancellationToken,
    ) -> ApprovalVerdict {
        let round_id = format!("round-{}", self.next_round.fetch_add(1, Ordering::SeqCst));
        let mut approved = Vec::new();
        let mut rejections = Vec::new();
        let mut suspended = Vec::new();
        let mut prompts = Vec::new();

        for call in calls {
            if let Some(rule) = matching_rule(rules, &call, RuleKind::Deny) {
                self.log(
                    ApprovalDecision::new(&round_id, &call.name, &call.provider_id, ApprovalAction::AutoDenied)
                        .with_reason(format!("deny rule `{}`", rule.pattern)),
                );
                rejections.push(ToolResult::denied(
                    &call.id,
                    &call.name,
                    format!("blocked by deny rule `{}`", rule.pattern),
                ));
            } else if let Some(rule) = matching_rule(rules, &call, RuleKind::Allow) {
                self.log(
                    ApprovalDecision::new(&round_id, &call.name, &call.provider_id, ApprovalAction::AutoApproved)
                        .with_reason(format!("allow rule `{}`", rule.pattern)),
                );
                approved.push(call);
            } else if memory.contains(&call.name) {
                self.log(ApprovalDecision::new(
                    &round_id,
                    &call.name,
                    &call.provider_id,
                    ApprovalAction::SessionApproved,
                ));
                approved.push(call);
            } else {
                let request_id =
                    format!("apr-{}", self.next_request.fetch_add(1, Ordering::SeqCst));
                let (tx, rx) = oneshot::channel();
                {
                    let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                    pending.insert(
                        request_id.clone(),
                        PendingEntry {
                            round_id: round_id.clone(),
                            tool_name: call.name.clone(),
                            provider_id: call.provider_id.clone(),
                            resolver: tx,
                        },
                    );
                }
                prompts.push(PendingApproval {
                    request_id: request_id.clone(),
                    round_id: round_id.clone(),
                    tool_name: call.name.clone(),
                    provider_id: call.provider_id.clone(),
                    arguments: call.arguments.clone(),
                });
                suspended.push((call, request_id, rx));
            }
        }

        if !suspended.is_empty() {
            debug!(
                round_id = %round_id,
                pending = suspended.len(),
                "Suspending round for external approval"
            );
            self.prompt.on_approval_required(&round_id, &prompts);

            let wait = futures::future::join_all(suspended.into_iter().map(
                |(call, request_id, rx)| async move {
                    // A dropped sender means the entry vanished without a
                    // decision; treat as dismissed.
                    let resolution = rx.await.unwrap_or(Resolution {
                        action: DecisionAction::Dismiss,
                        remember: false,
                    });
                    (call, request_id, resolution)
                },
            ));
            tokio::pin!(wait);

            let resolved = tokio::select! {
                resolved = &mut wait => resolved,
                _ = cancel.cancelled() => {
                    debug!(round_id = %round_id, "Round cancelled, dismissing pending approvals");
                    self.decide_all(&round_id, DecisionAction::Dismiss);
                    // Every resolver has now fired; the join completes
                    // immediately.
                    wait.await
                }
            };

            for (call, request_id, resolution) in resolved {
                match resolution.action {
                    DecisionAction::Approve => {
                        let mut decision = ApprovalDecision::new(
                            &request_id,
                            &call.name,
                            &call.provider_id,
                            ApprovalAction::Approved,
                        );
                        if resolution.remember {
                            memory.remember(&call.name);
                            decision = decision.remembered();
                        }
                        self.log(decision);
                        approved.push(call);
                    }
                    DecisionAction::Deny => {
                        self.log(ApprovalDecision::new(
                            &request_id,
                            &call.name,
                            &call.provider_id,
                            ApprovalAction::Denied,
                        ));
                        rejections.push(ToolResult::denied(
                            &call.id,
                            &call.name,
                            "denied by the user",
                        ));
                    }
                    DecisionAction::Dismiss => {
                        self.log(ApprovalDecision::new(
                            &request_id,
                            &call.name,
                            &call.provider_id,
                            ApprovalAction::Dismissed,
                        ));
                        rejections.push(ToolResult::denied(
                            &call.id,
                            &call.name,
                            "approval prompt dismissed",
                        ));
                    }
                }
            }
        }

        ApprovalVerdict {
            approved,
            rejections,
        }
    }

    /// Resolve one pending approval. Returns `false` for an unknown (or
    /// already resolved) request id.
    pub fn decide(&self, request_id: &str, action: DecisionAction, remember: bool) -> bool {
        let entry = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(request_id)
        };
        match entry {
            Some(entry) => {
                debug!(request_id, tool = %entry.tool_name, ?action, "Approval decided");
                let _ = entry.resolver.send(Resolution { action, remember });
                true
            }
            None => {
                warn!(request_id, "Decision for unknown approval request");
                false
            }
        }
    }

    /// Resolve every pending approval of one round with the same action
    /// ("approve all" / "deny all"). Returns how many calls were resolved.
    pub fn decide_all(&self, round_id: &str, action: DecisionAction) -> usize {
        let entries: Vec<PendingEntry> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, e)| e.round_id == round_id)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter().filter_map(|id| pending.remove(&id)).collect()
        };
        let count = entries.len();
        for entry in entries {
            let _ = entry.resolver.send(Resolution {
                action,
                remember: false,
            });
        }
        debug!(round_id, count, ?action, "Bulk approval decision");
        count
    }

    /// Number of calls currently suspended.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Snapshot of the append-only decision log.
    pub fn decisions(&self) -> Vec<ApprovalDecision> {
        self.decisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn log(&self, decision: ApprovalDecision) {
        self.decisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(decision);
    }
}

/// First enabled rule of the given kind matching the call, if any.
fn matching_rule<'r>(
    rules: &'r [ApprovalRule],
    call: &ToolCall,
    kind: RuleKind,
) -> Option<&'r ApprovalRule> {
    rules
        .iter()
        .filter(|r| r.enabled && r.kind == kind)
        .find(|r| {
            let target = match r.scope {
                RuleScope::Tool => call.name.as_str(),
                RuleScope::Provider => call.provider_id.as_str(),
            };
            match glob::Pattern::new(&r.pattern) {
                Ok(pattern) => pattern.matches(target),
                Err(e) => {
                    warn!(pattern = %r.pattern, error = %e, "Invalid approval rule pattern");
                    false
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tokio::sync::mpsc;
    use switchboard_domain::{Tool, ToolOutcome, ToolSchema};

    fn call_for(provider: &str, display: &str, name: &str) -> ToolCall {
        let tool = Tool::new(provider, display, name, None, ToolSchema::object());
        ToolCall::new(format!("call-{}", name), &tool, Map::new())
    }

    /// Prompt that forwards notifications to a test channel.
    struct ChannelPrompt {
        tx: mpsc::UnboundedSender<(String, Vec<PendingApproval>)>,
    }

    impl ApprovalPrompt for ChannelPrompt {
        fn on_approval_required(&self, round_id: &str, pending: &[PendingApproval]) {
            let _ = self.tx.send((round_id.to_string(), pending.to_vec()));
        }
    }

    fn gate_with_channel() -> (
        Arc<ApprovalGate>,
        mpsc::UnboundedReceiver<(String, Vec<PendingApproval>)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ApprovalGate::new(Arc::new(ChannelPrompt { tx }))), rx)
    }

    #[tokio::test]
    async fn allow_rule_auto_approves_without_prompt() {
        let (gate, _rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");
        let rules = vec![ApprovalRule::allow_tool("github_mcp_*")];

        let verdict = gate
            .request_approval(
                vec![call_for("github-mcp", "github-mcp", "search_issues")],
                &mut memory,
                &rules,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(verdict.approved.len(), 1);
        assert!(verdict.rejections.is_empty());
        assert_eq!(gate.decisions()[0].action, ApprovalAction::AutoApproved);
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn deny_rule_beats_allow_rule() {
        let (gate, _rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");
        // Same call matches both; deny must win.
        let rules = vec![
            ApprovalRule::allow_tool("github_mcp_*"),
            ApprovalRule::deny_tool("*_search_issues"),
        ];

        let verdict = gate
            .request_approval(
                vec![call_for("github-mcp", "github-mcp", "search_issues")],
                &mut memory,
                &rules,
                &CancellationToken::new(),
            )
            .await;

        assert!(verdict.approved.is_empty());
        assert_eq!(verdict.rejections.len(), 1);
        assert!(matches!(
            verdict.rejections[0].outcome,
            ToolOutcome::Denied { .. }
        ));
        assert_eq!(gate.decisions()[0].action, ApprovalAction::AutoDenied);
    }

    #[tokio::test]
    async fn provider_scoped_deny_rule_matches_provider_id() {
        let (gate, _rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");
        let rules = vec![
            ApprovalRule::deny_provider("jira-*"),
            ApprovalRule::allow_provider("github-*"),
        ];

        let verdict = gate
            .request_approval(
                vec![
                    call_for("jira-mcp", "jira-mcp", "delete_issue"),
                    call_for("github-mcp", "github-mcp", "search_issues"),
                ],
                &mut memory,
                &rules,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(verdict.rejections.len(), 1);
        assert_eq!(verdict.rejections[0].tool_name, "jira_mcp_delete_issue");
        assert_eq!(verdict.approved.len(), 1);
    }

    #[tokio::test]
    async fn session_memory_matches_by_name_ignoring_arguments() {
        let (gate, _rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");
        memory.remember("github_mcp_search_issues");

        let tool = Tool::new("github-mcp", "github-mcp", "search_issues", None, ToolSchema::object());
        let call = ToolCall::new("c1", &tool, Map::new()).with_arg("query", "different args");

        let verdict = gate
            .request_approval(vec![call], &mut memory, &[], &CancellationToken::new())
            .await;

        assert_eq!(verdict.approved.len(), 1);
        assert_eq!(gate.decisions()[0].action, ApprovalAction::SessionApproved);
    }

    #[tokio::test]
    async fn pending_calls_resolve_individually() {
        let (gate, rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");

        let decider = {
            let gate = Arc::clone(&gate);
            tokio::task::spawn_blocking(move || {
                let mut rx = rx;
                let (_round, pending) = rx.blocking_recv().unwrap();
                assert_eq!(pending.len(), 2);
                gate.decide(&pending[0].request_id, DecisionAction::Approve, false);
                gate.decide(&pending[1].request_id, DecisionAction::Deny, false);
            })
        };

        let verdict = gate
            .request_approval(
                vec![
                    call_for("github-mcp", "github-mcp", "search_issues"),
                    call_for("jira-mcp", "jira-mcp", "delete_issue"),
                ],
                &mut memory,
                &[],
                &CancellationToken::new(),
            )
            .await;
        decider.await.unwrap();

        assert_eq!(verdict.approved.len(), 1);
        assert_eq!(verdict.approved[0].name, "github_mcp_search_issues");
        assert_eq!(verdict.rejections.len(), 1);
        assert_eq!(verdict.rejections[0].tool_name, "jira_mcp_delete_issue");
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn decide_all_approves_whole_round() {
        let (gate, rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");

        let decider = {
            let gate = Arc::clone(&gate);
            tokio::task::spawn_blocking(move || {
                let mut rx = rx;
                let (round_id, pending) = rx.blocking_recv().unwrap();
                assert_eq!(gate.decide_all(&round_id, DecisionAction::Approve), pending.len());
            })
        };

        let verdict = gate
            .request_approval(
                vec![
                    call_for("github-mcp", "github-mcp", "search_issues"),
                    call_for("github-mcp", "github-mcp", "create_issue"),
                ],
                &mut memory,
                &[],
                &CancellationToken::new(),
            )
            .await;
        decider.await.unwrap();

        assert_eq!(verdict.approved.len(), 2);
        assert!(verdict.rejections.is_empty());
    }

    #[tokio::test]
    async fn remember_for_session_updates_memory() {
        let (gate, rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");

        let decider = {
            let gate = Arc::clone(&gate);
            tokio::task::spawn_blocking(move || {
                let mut rx = rx;
                let (_round, pending) = rx.blocking_recv().unwrap();
                gate.decide(&pending[0].request_id, DecisionAction::Approve, true);
            })
        };

        let tool = Tool::new("github-mcp", "github-mcp", "search_issues", None, ToolSchema::object());
        let first = ToolCall::new("c1", &tool, Map::new()).with_arg("a", 1);
        let verdict = gate
            .request_approval(vec![first], &mut memory, &[], &CancellationToken::new())
            .await;
        decider.await.unwrap();
        assert_eq!(verdict.approved.len(), 1);
        assert!(memory.contains("github_mcp_search_issues"));

        // A later call to the same tool with different arguments is
        // session-approved with no prompt.
        let second = ToolCall::new("c2", &tool, Map::new()).with_arg("a", 2);
        let verdict = gate
            .request_approval(vec![second], &mut memory, &[], &CancellationToken::new())
            .await;
        assert_eq!(verdict.approved.len(), 1);
        let actions: Vec<_> = gate.decisions().iter().map(|d| d.action).collect();
        assert!(actions.contains(&ApprovalAction::SessionApproved));
    }

    #[tokio::test]
    async fn cancellation_dismisses_pending_round() {
        let (gate, rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                let mut rx = rx;
                let (_round, _pending) = rx.blocking_recv().unwrap();
                cancel.cancel();
            })
        };

        let verdict = gate
            .request_approval(
                vec![call_for("github-mcp", "github-mcp", "search_issues")],
                &mut memory,
                &[],
                &cancel,
            )
            .await;
        canceller.await.unwrap();

        assert!(verdict.approved.is_empty());
        assert_eq!(verdict.rejections.len(), 1);
        assert_eq!(gate.decisions()[0].action, ApprovalAction::Dismissed);
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn disabled_rules_never_match() {
        let (gate, rx) = gate_with_channel();
        let mut memory = SessionApprovalMemory::new("s1");
        let rules = vec![ApprovalRule::deny_tool("*").disabled()];

        let decider = {
            let gate = Arc::clone(&gate);
            tokio::task::spawn_blocking(move || {
                let mut rx = rx;
                let (_round, pending) = rx.blocking_recv().unwrap();
                // The disabled deny rule did not short-circuit: the call
                // suspended and needs a real decision.
                gate.decide(&pending[0].request_id, DecisionAction::Approve, false);
            })
        };

        let verdict = gate
            .request_approval(
                vec![call_for("github-mcp", "github-mcp", "search_issues")],
                &mut memory,
                &rules,
                &CancellationToken::new(),
            )
            .await;
        decider.await.unwrap();
        assert_eq!(verdict.approved.len(), 1);
    }

    #[test]
    fn decide_unknown_request_returns_false() {
        let (gate, _rx) = gate_with_channel();
        assert!(!gate.decide("apr-999", DecisionAction::Approve, false));
    }
}
