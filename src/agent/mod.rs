//! Agent module - leaf agents, composites and pipeline composition
//!
//! Every node of a pipeline is an [`Agent`]: a name, an optional output key
//! and timeout, and a kind that decides how the node executes. Leaf kinds
//! (`Llm`, `Custom`) produce the trace entries; composite kinds (`Sequential`,
//! `Parallel`, `Loop`) only coordinate their sub-agents.

pub mod composer;
pub mod context;
pub mod custom;
pub mod llm_agent;
pub mod loop_agent;
pub mod parallel;
pub mod sequential;
pub mod step_state;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{ConductorError, Result, Session, StepResult};

pub use composer::{Composer, Pipeline};
pub use context::{ExecutionContext, Trace};
pub use custom::{fn_agent, AgentBehavior, CustomAgent};
pub use llm_agent::{LlmAgent, LlmAgentBuilder};
pub use loop_agent::{LoopAgent, LoopAgentBuilder, LoopControl, LoopState};
pub use parallel::{BranchOutcome, ParallelAgent, ParallelAgentBuilder};
pub use sequential::{SequentialAgent, SequentialAgentBuilder};
pub use step_state::StepState;

/// How an agent node executes
pub enum AgentKind {
    /// Model-driven leaf with tool calls
    Llm(LlmAgent),
    /// Hand-written leaf that never calls the model
    Custom(CustomAgent),
    /// Sub-agents one after another
    Sequential(SequentialAgent),
    /// Sub-agents concurrently
    Parallel(ParallelAgent),
    /// One sub-agent repeated
    Loop(LoopAgent),
}

/// Execution mode of an agent, for logging and inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Leaf,
    Custom,
    Sequential,
    Parallel,
    Loop,
}

/// A node of a pipeline
pub struct Agent {
    name: String,
    description: String,
    output_key: Option<String>,
    timeout: Option<Duration>,
    kind: AgentKind,
}

impl Agent {
    pub(crate) fn new(name: impl Into<String>, kind: AgentKind) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConductorError::invalid_graph("agent name must not be empty"));
        }
        Ok(Self {
            description: format!("Agent '{}'", name),
            name,
            output_key: None,
            timeout: None,
            kind,
        })
    }

    /// Set the description used when the agent is exposed as a tool
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Store the whole output under `key` instead of merging object keys
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Bound every execution of this agent, overriding the step timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wrap in an `Arc` for use in composites and tools
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Agent name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Agent description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Output key, if any
    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    /// Own timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Kind of this node
    pub fn kind(&self) -> &AgentKind {
        &self.kind
    }

    /// Execution mode of this node
    pub fn mode(&self) -> ExecutionMode {
        match &self.kind {
            AgentKind::Llm(_) => ExecutionMode::Leaf,
            AgentKind::Custom(_) => ExecutionMode::Custom,
            AgentKind::Sequential(_) => ExecutionMode::Sequential,
            AgentKind::Parallel(_) => ExecutionMode::Parallel,
            AgentKind::Loop(_) => ExecutionMode::Loop,
        }
    }

    /// Leaves record their own results into the trace
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, AgentKind::Llm(_) | AgentKind::Custom(_))
    }

    /// Direct sub-agents, in declared order
    pub fn children(&self) -> Vec<&Arc<Agent>> {
        match &self.kind {
            AgentKind::Sequential(seq) => seq.agents().iter().collect(),
            AgentKind::Parallel(par) => par.agents().iter().collect(),
            AgentKind::Loop(lp) => vec![lp.body()],
            AgentKind::Llm(_) | AgentKind::Custom(_) => Vec::new(),
        }
    }

    /// Tools this agent declares
    pub fn tool_names(&self) -> &[String] {
        match &self.kind {
            AgentKind::Llm(llm) => llm.tools(),
            _ => &[],
        }
    }

    /// Execute this agent on `input`.
    ///
    /// On success the output is absorbed into `session`. Leaf results, success
    /// or failure, are appended to the context's trace; a composite only
    /// records a failure it caused itself (its own timeout).
    pub fn execute<'a>(
        &'a self,
        input: Value,
        session: &'a mut Session,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepResult>> {
        async move {
            if ctx.is_cancelled() {
                let err = ConductorError::Cancelled;
                if self.is_primitive() {
                    ctx.trace().push(StepResult::failure(&self.name, &err));
                }
                return Err(err);
            }

            tracing::debug!(agent = %self.name, mode = ?self.mode(), "executing agent");

            let limit = self.timeout.or_else(|| {
                if self.is_primitive() {
                    ctx.config().step_timeout()
                } else {
                    None
                }
            });

            let run = self.dispatch(input, session, ctx);
            let (result, own_failure) = match limit {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => (result, self.is_primitive()),
                    Err(_) => (
                        Err(ConductorError::timeout(
                            format!("Agent '{}'", self.name),
                            limit.as_millis() as u64,
                        )),
                        true,
                    ),
                },
                None => (run.await, self.is_primitive()),
            };

            match result {
                Ok(step) => {
                    session.absorb_output(self.output_key.as_deref(), &step.output);
                    if self.is_primitive() {
                        ctx.trace().push(step.clone());
                    }
                    Ok(step)
                }
                Err(err) => {
                    tracing::warn!(agent = %self.name, error = %err, "agent failed");
                    if own_failure {
                        ctx.trace().push(StepResult::failure(&self.name, &err));
                    }
                    Err(err)
                }
            }
        }
        .boxed()
    }

    async fn dispatch(
        &self,
        input: Value,
        session: &mut Session,
        ctx: &ExecutionContext,
    ) -> Result<StepResult> {
        match &self.kind {
            AgentKind::Llm(llm) => llm.run(&self.name, input, session, ctx).await,
            AgentKind::Custom(custom) => custom.run(&self.name, input, session, ctx).await,
            AgentKind::Sequential(seq) => seq.run(&self.name, input, session, ctx).await,
            AgentKind::Parallel(par) => par.run(&self.name, input, session, ctx).await,
            AgentKind::Loop(lp) => lp.run(&self.name, input, session, ctx).await,
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .field("output_key", &self.output_key)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::RunConfig;
    use crate::llm::ModelClient;
    use crate::tools::ToolRegistry;
    use tokio_util::sync::CancellationToken;

    pub fn context_with(
        model: impl ModelClient + 'static,
        tools: ToolRegistry,
        config: RunConfig,
    ) -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(model),
            Arc::new(tools),
            Arc::new(config),
            "test-model",
            CancellationToken::new(),
        )
    }

    pub fn quiet_config() -> RunConfig {
        RunConfig {
            retry: crate::core::RetryPolicy::none(),
            ..RunConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    #[test]
    fn test_empty_name_rejected() {
        let err = fn_agent(" ", |input, _| Ok(input)).unwrap_err();
        assert!(matches!(err, ConductorError::InvalidGraph(_)));
    }

    #[tokio::test]
    async fn test_output_key_stores_whole_output() {
        let agent = fn_agent("a", |_, _| Ok(json!({"x": 1})))
            .unwrap()
            .with_output_key("result");
        let ctx = context_with(ScriptedModel::new(), ToolRegistry::new(), quiet_config());
        let mut session = Session::new();

        agent.execute(json!(null), &mut session, &ctx).await.unwrap();

        assert_eq!(session.get("result"), Some(&json!({"x": 1})));
        assert!(!session.contains("x"));
    }

    #[tokio::test]
    async fn test_leaf_recorded_in_trace() {
        let agent = fn_agent("a", |_, _| Ok(json!({"x": 1}))).unwrap();
        let ctx = context_with(ScriptedModel::new(), ToolRegistry::new(), quiet_config());
        let mut session = Session::new();

        agent.execute(json!(null), &mut session, &ctx).await.unwrap();

        assert_eq!(ctx.trace().snapshot(), vec![StepResult::success("a", json!({"x": 1}))]);
        assert_eq!(session.get("x"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let agent = fn_agent("a", |input, _| Ok(input)).unwrap();
        let ctx = context_with(ScriptedModel::new(), ToolRegistry::new(), quiet_config());
        ctx.cancel_token().cancel();
        let mut session = Session::new();

        let err = agent.execute(json!(1), &mut session, &ctx).await.unwrap_err();

        assert!(matches!(err, ConductorError::Cancelled));
        let trace = ctx.trace().snapshot();
        assert_eq!(trace.len(), 1);
        assert!(!trace[0].success);
    }

    #[tokio::test]
    async fn test_own_timeout_fails_step() {
        let model = ScriptedModel::new().with_latency("slow", Duration::from_millis(200));
        let agent = LlmAgent::builder("slow")
            .instruction("{input}")
            .build()
            .unwrap()
            .with_timeout(Duration::from_millis(20));
        let ctx = context_with(model, ToolRegistry::new(), quiet_config());
        let mut session = Session::new();

        let err = agent.execute(json!("hi"), &mut session, &ctx).await.unwrap_err();

        assert!(matches!(err, ConductorError::Timeout { after_ms: 20, .. }));
        assert_eq!(ctx.trace().len(), 1);
    }
}
