//! Parallel composite
//!
//! ```text
//!            ┌──► [A] ──┐
//! input ─────┼──► [B] ──┼──► merge ──► output
//!            └──► [C] ──┘
//! ```
//!
//! Branches run concurrently on the calling task, each on its own copy of the
//! session and its own trace buffer. Results, traces and session writes are
//! combined by declared position, never by completion order.

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::agent::{Agent, AgentKind, ExecutionContext, Trace};
use crate::core::{ConductorError, ParallelErrorPolicy, Result, Session, StepResult};

type MergeFn = Arc<dyn Fn(&[BranchOutcome]) -> Value + Send + Sync>;

/// Result of one branch, handed to the merge function
#[derive(Debug, Clone)]
pub struct BranchOutcome {
    /// Declared position of the branch
    pub index: usize,
    /// Branch agent name
    pub agent: String,
    /// What the branch produced (a failure result for failed branches)
    pub result: StepResult,
}

/// Sub-agents executed concurrently
pub struct ParallelAgent {
    agents: Vec<Arc<Agent>>,
    policy: Option<ParallelErrorPolicy>,
    merge: MergeFn,
}

/// Builder for parallel composites
pub struct ParallelAgentBuilder {
    name: String,
    agents: Vec<Arc<Agent>>,
    policy: Option<ParallelErrorPolicy>,
    merge: Option<MergeFn>,
}

impl ParallelAgentBuilder {
    /// Create a new builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            policy: None,
            merge: None,
        }
    }

    /// Add a branch
    pub fn agent(mut self, agent: Arc<Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Add several branches
    pub fn agents(mut self, agents: impl IntoIterator<Item = Arc<Agent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Override the run-wide error policy for this composite
    pub fn policy(mut self, policy: ParallelErrorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Combine branch outcomes with a custom function
    pub fn merge<F>(mut self, merge: F) -> Self
    where
        F: Fn(&[BranchOutcome]) -> Value + Send + Sync + 'static,
    {
        self.merge = Some(Arc::new(merge));
        self
    }

    /// Build the composite; fails on an empty list
    pub fn build(self) -> Result<Agent> {
        if self.agents.is_empty() {
            return Err(ConductorError::invalid_graph(format!(
                "parallel agent '{}' has no sub-agents",
                self.name
            )));
        }
        Agent::new(
            self.name,
            AgentKind::Parallel(ParallelAgent {
                agents: self.agents,
                policy: self.policy,
                merge: self.merge.unwrap_or_else(|| Arc::new(merge_by_name)),
            }),
        )
    }
}

/// Default merge: `{branch_name: output}`, failed branches as `{"error": msg}`
pub fn merge_by_name(outcomes: &[BranchOutcome]) -> Value {
    let mut merged = Map::new();
    for outcome in outcomes {
        let value = if outcome.result.success {
            outcome.result.output.clone()
        } else {
            json!({ "error": outcome.result.error.clone().unwrap_or_default() })
        };
        merged.insert(outcome.agent.clone(), value);
    }
    Value::Object(merged)
}

struct Finished {
    result: Result<StepResult>,
    session: Session,
}

/// Per-branch trace buffers, copied into the parent trace in declared order
/// exactly once. Dropping the composite mid-flight (a timeout) still flushes
/// whatever the branches recorded so far.
struct BranchTraces<'a> {
    parent: &'a Trace,
    branches: Vec<Trace>,
    flushed: bool,
}

impl<'a> BranchTraces<'a> {
    fn new(parent: &'a Trace, count: usize) -> Self {
        Self {
            parent,
            branches: (0..count).map(|_| Trace::new()).collect(),
            flushed: false,
        }
    }

    fn flush(&mut self) {
        if std::mem::replace(&mut self.flushed, true) {
            return;
        }
        for branch in &self.branches {
            self.parent.extend(branch.snapshot());
        }
    }
}

impl Drop for BranchTraces<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl ParallelAgent {
    /// Create a builder
    pub fn builder(name: impl Into<String>) -> ParallelAgentBuilder {
        ParallelAgentBuilder::new(name)
    }

    /// Branches in declared order
    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub(crate) async fn run(
        &self,
        name: &str,
        input: Value,
        session: &mut Session,
        ctx: &ExecutionContext,
    ) -> Result<StepResult> {
        let policy = self.policy.unwrap_or(ctx.config().parallel_error_policy);
        let group = ctx.cancel_token().child_token();
        // Declared before `pending` so in-flight branches drop first
        let mut traces = BranchTraces::new(ctx.trace(), self.agents.len());

        let mut pending = FuturesUnordered::new();
        for (index, agent) in self.agents.iter().enumerate() {
            let branch_ctx = ctx.branch(&group, traces.branches[index].clone());
            let mut branch_session = session.clone();
            let input = input.clone();
            pending.push(async move {
                let result = agent.execute(input, &mut branch_session, &branch_ctx).await;
                let finished = Finished {
                    result,
                    session: branch_session,
                };
                (index, finished)
            });
        }

        let mut slots: Vec<Option<Finished>> = self.agents.iter().map(|_| None).collect();
        while let Some((index, finished)) = pending.next().await {
            if let Err(e) = &finished.result {
                if policy == ParallelErrorPolicy::FailFast && !group.is_cancelled() {
                    tracing::debug!(parallel = name, branch = index, error = %e, "cancelling siblings");
                    group.cancel();
                }
            }
            slots[index] = Some(finished);
        }
        drop(pending);
        traces.flush();

        let finished: Vec<Finished> = slots.into_iter().flatten().collect();

        if ctx.is_cancelled() {
            return Err(ConductorError::Cancelled);
        }

        if policy == ParallelErrorPolicy::FailFast && finished.iter().any(|b| b.result.is_err()) {
            return Err(first_failure(finished));
        }

        let base = session.clone();
        let mut outcomes = Vec::with_capacity(finished.len());
        let mut failures = Vec::new();
        for (index, (branch, agent)) in finished.into_iter().zip(&self.agents).enumerate() {
            let result = match branch.result {
                Ok(step) => {
                    session.apply(branch.session.delta_since(&base));
                    step
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    failures.push(format!("{}: {}", agent.name(), e));
                    StepResult::failure(agent.name(), &e)
                }
            };
            outcomes.push(BranchOutcome {
                index,
                agent: agent.name().to_string(),
                result,
            });
        }

        let step = StepResult::success(name, (self.merge)(&outcomes));
        if failures.is_empty() {
            Ok(step)
        } else {
            tracing::warn!(parallel = name, failed = failures.len(), "branches failed");
            Ok(step.with_error_summary(format!(
                "{} of {} branches failed: {}",
                failures.len(),
                outcomes.len(),
                failures.join("; ")
            )))
        }
    }
}

/// The failure to propagate under fail-fast: the first declared branch that
/// failed on its own, rather than one cancelled because of it.
fn first_failure(finished: Vec<Finished>) -> ConductorError {
    let mut cancelled = None;
    for branch in finished {
        match branch.result {
            Err(ConductorError::Cancelled) => cancelled = Some(ConductorError::Cancelled),
            Err(e) => return e,
            Ok(_) => {}
        }
    }
    cancelled.unwrap_or(ConductorError::Cancelled)
}
