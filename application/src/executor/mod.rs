//! Tool call executor
//!
//! Runs cleared calls against their providers with bounded fan-out and an
//! independent timeout per call. All failures are represented as
//! [`ToolResult`] data — a timeout, a provider-reported error, or a
//! transport failure on one call never disturbs its siblings, and nothing
//! here panics for a tool-level failure.
//!
//! Cancellation stops the *waiting*, not the work: calls already dispatched
//! to a provider finish in the background (their results are discarded),
//! while calls still unaccounted for resolve as cancellation errors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use switchboard_domain::{ToolCall, ToolOutcome, ToolResult};

use crate::ports::progress::{NoTurnProgress, TurnProgress};
use crate::ports::tool_invoker::ToolInvoker;

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Executor for one engine instance. Cheap to clone.
#[derive(Clone)]
pub struct Executor {
    invoker: Arc<dyn ToolInvoker>,
    progress: Arc<dyn TurnProgress>,
    call_timeout: Duration,
    /// Maximum concurrent calls per batch. `None` = unbounded up to batch
    /// size.
    fan_out: Option<usize>,
}

impl Executor {
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            progress: Arc::new(NoTurnProgress),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            fan_out: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_fan_out(mut self, fan_out: Option<usize>) -> Self {
        self.fan_out = fan_out.filter(|n| *n > 0);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn TurnProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Execute a batch of cleared calls, returning one result per call in
    /// input order.
    pub async fn execute(
        &self,
        calls: Vec<ToolCall>,
        cancel: &CancellationToken,
    ) -> Vec<ToolResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let total = calls.len();
        let order: Vec<(String, String)> = calls
            .iter()
            .map(|c| (c.id.clone(), c.name.clone()))
            .collect();
        let semaphore = self
            .fan_out
            .map(|n| Arc::new(Semaphore::new(n)));
        let (tx, mut rx) = mpsc::unbounded_channel::<ToolResult>();

        for call in calls {
            let invoker = Arc::clone(&self.invoker);
            let progress = Arc::clone(&self.progress);
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            let timeout = self.call_timeout;

            // Detached on purpose: a cancelled round stops collecting, the
            // provider call still runs to completion in the background.
            tokio::spawn(async move {
                let _permit = match &semaphore {
                    Some(s) => Some(s.acquire().await),
                    None => None,
                };
                progress.on_call_started(&call);
                let started = std::time::Instant::now();

                let outcome = match tokio::time::timeout(timeout, invoker.invoke(&call)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(call_id = %call.id, tool = %call.name, "Tool call timed out");
                        ToolOutcome::retryable_error(
                            format!("no response within {}s", timeout.as_secs()),
                            "timeout",
                        )
                    }
                };

                let result = ToolResult::new(&call.id, &call.name, outcome)
                    .with_duration(started.elapsed().as_millis() as u64);
                progress.on_call_finished(&result);
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let mut by_id: HashMap<String, ToolResult> = HashMap::with_capacity(total);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(
                        received = by_id.len(),
                        total,
                        "Execution cancelled; dispatched calls continue in the background"
                    );
                    break;
                }
                received = rx.recv() => match received {
                    Some(result) => {
                        by_id.insert(result.call_id.clone(), result);
                        if by_id.len() == total {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }

        // One result per call, input order; anything not collected resolves
        // as a cancellation error.
        order
            .into_iter()
            .map(|(call_id, tool_name)| {
                by_id.remove(&call_id).unwrap_or_else(|| {
                    ToolResult::new(
                        &call_id,
                        &tool_name,
                        ToolOutcome::Error {
                            message: "round cancelled before the call completed".to_string(),
                            code: Some("cancelled".to_string()),
                            retryable: false,
                        },
                    )
                })
            })
            .collect()
    }
}
