//! Loop composite
//!
//! ```text
//!        ┌────────────────────────────┐
//!        ▼                            │ Continue
//! input ─► [body] ─► predicate(state) ┤
//!                                     │ Stop / bound reached
//!                                     ▼
//!                                   output
//! ```
//!
//! Repeats one sub-agent, feeding each output back as the next input, until
//! the predicate stops it or the iteration bound is reached.

use serde_json::Value;
use std::sync::Arc;

use crate::agent::{Agent, AgentKind, ExecutionContext};
use crate::core::{ConductorError, Result, Session, StepResult};

/// Whether a loop runs another iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

impl LoopControl {
    /// `Stop` when `done` is true
    pub fn stop_if(done: bool) -> Self {
        if done {
            LoopControl::Stop
        } else {
            LoopControl::Continue
        }
    }
}

/// What the continuation predicate sees after each iteration
#[derive(Debug)]
pub struct LoopState<'a> {
    /// Iterations completed so far, starting at 1
    pub iteration: usize,
    /// Result of the iteration that just finished
    pub last: &'a StepResult,
    /// Session after that iteration
    pub session: &'a Session,
}

type Predicate = Arc<dyn Fn(&LoopState<'_>) -> LoopControl + Send + Sync>;

/// One sub-agent repeated under a predicate
pub struct LoopAgent {
    body: Arc<Agent>,
    max_iterations: Option<usize>,
    tolerate_failures: bool,
    predicate: Predicate,
}

/// Builder for loop composites
pub struct LoopAgentBuilder {
    name: String,
    body: Arc<Agent>,
    max_iterations: Option<usize>,
    tolerate_failures: bool,
    predicate: Option<Predicate>,
}

impl LoopAgentBuilder {
    /// Create a new builder repeating `body`
    pub fn new(name: impl Into<String>, body: Arc<Agent>) -> Self {
        Self {
            name: name.into(),
            body,
            max_iterations: None,
            tolerate_failures: false,
            predicate: None,
        }
    }

    /// Upper bound for this loop; the run's `max_loop_iterations` still caps it
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Continuation predicate; without one the loop runs to its bound
    pub fn until<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&LoopState<'_>) -> LoopControl + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Stop once the session holds `expected` under `key`
    pub fn until_session_eq(self, key: impl Into<String>, expected: Value) -> Self {
        let key = key.into();
        self.until(move |state| LoopControl::stop_if(state.session.get(&key) == Some(&expected)))
    }

    /// Hand failed iterations to the predicate instead of failing the loop
    pub fn tolerate_failures(mut self, tolerate: bool) -> Self {
        self.tolerate_failures = tolerate;
        self
    }

    /// Build the composite; a zero bound is rejected
    pub fn build(self) -> Result<Agent> {
        if self.max_iterations == Some(0) {
            return Err(ConductorError::invalid_graph(format!(
                "loop agent '{}' must allow at least one iteration",
                self.name
            )));
        }
        Agent::new(
            self.name,
            AgentKind::Loop(LoopAgent {
                body: self.body,
                max_iterations: self.max_iterations,
                tolerate_failures: self.tolerate_failures,
                predicate: self.predicate.unwrap_or_else(|| Arc::new(run_to_bound)),
            }),
        )
    }
}

fn run_to_bound(_: &LoopState<'_>) -> LoopControl {
    LoopControl::Continue
}

impl LoopAgent {
    /// Create a builder
    pub fn builder(name: impl Into<String>, body: Arc<Agent>) -> LoopAgentBuilder {
        LoopAgentBuilder::new(name, body)
    }

    /// The repeated sub-agent
    pub fn body(&self) -> &Arc<Agent> {
        &self.body
    }

    /// Effective bound under a run-wide cap
    pub fn bound(&self, cap: usize) -> usize {
        self.max_iterations.map_or(cap, |max| max.min(cap))
    }

    pub(crate) async fn run(
        &self,
        name: &str,
        input: Value,
        session: &mut Session,
        ctx: &ExecutionContext,
    ) -> Result<StepResult> {
        let bound = self.bound(ctx.config().max_loop_iterations);
        let mut current = input;
        let mut iteration = 0;

        loop {
            iteration += 1;
            let step = match self.body.execute(current.clone(), session, ctx).await {
                Ok(step) => step,
                Err(e) if self.tolerate_failures && !e.is_cancelled() => {
                    tracing::warn!(loop_agent = name, iteration, error = %e, "iteration failed, continuing");
                    StepResult::failure(self.body.name(), &e)
                }
                Err(e) => return Err(e),
            };

            let control = (self.predicate)(&LoopState {
                iteration,
                last: &step,
                session: &*session,
            });

            if control == LoopControl::Stop || iteration >= bound {
                tracing::debug!(loop_agent = name, iteration, ?control, "loop finished");
                let mut result = step;
                result.agent = name.to_string();
                return Ok(result.with_iterations(iteration));
            }

            if step.success {
                current = step.output;
            }
        }
    }
}
