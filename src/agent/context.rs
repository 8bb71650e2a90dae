//! Execution context shared by every step of a run
//!
//! Carries the model client, the tool registry, the immutable run limits, the
//! cancellation token and the trace buffer steps are recorded into.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::{ConductorError, Result, RunConfig, StepResult};
use crate::llm::ModelClient;
use crate::tools::ToolRegistry;

/// Ordered record of step results
#[derive(Debug, Clone, Default)]
pub struct Trace {
    steps: Arc<Mutex<Vec<StepResult>>>,
}

impl Trace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one result
    pub fn push(&self, step: StepResult) {
        self.steps.lock().push(step);
    }

    /// Append results in order
    pub fn extend(&self, steps: Vec<StepResult>) {
        self.steps.lock().extend(steps);
    }

    /// Copy of every recorded result
    pub fn snapshot(&self) -> Vec<StepResult> {
        self.steps.lock().clone()
    }

    /// Number of recorded results
    pub fn len(&self) -> usize {
        self.steps.lock().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.steps.lock().is_empty()
    }
}

/// Everything an agent needs from the run it executes in
#[derive(Clone)]
pub struct ExecutionContext {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    config: Arc<RunConfig>,
    default_model: Arc<str>,
    cancel: CancellationToken,
    trace: Trace,
}

impl ExecutionContext {
    /// Create a context with a fresh trace
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        config: Arc<RunConfig>,
        default_model: impl Into<Arc<str>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            model,
            tools,
            config,
            default_model: default_model.into(),
            cancel,
            trace: Trace::new(),
        }
    }

    /// Model client used by LLM agents
    pub fn model(&self) -> &dyn ModelClient {
        self.model.as_ref()
    }

    /// Tool registry of the pipeline
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run limits
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Model name for agents that do not pick one
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Trace this context records into
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Cancellation token of this context
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Context for one parallel branch: cancelled together with `group`, and
    /// recording into `trace` instead of the parent trace.
    pub(crate) fn branch(&self, group: &CancellationToken, trace: Trace) -> Self {
        Self {
            cancel: group.child_token(),
            trace,
            ..self.clone()
        }
    }

    /// Await `fut` unless cancellation arrives first
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ConductorError::Cancelled),
            result = fut => result,
        }
    }

    /// Sleep between retry attempts, waking early on cancellation
    pub async fn pause(&self, delay: Duration) -> Result<()> {
        self.guard(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}
