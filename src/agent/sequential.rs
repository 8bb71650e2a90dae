//! Sequential composite
//!
//! ```text
//! input ──► [A] ──► [B] ──► [C] ──► output
//!            │       │       │
//!            └───────┴───────┴──► session (each output absorbed)
//! ```
//!
//! Each sub-agent receives the previous output as input. The first failure
//! stops the chain.

use serde_json::Value;
use std::sync::Arc;

use crate::agent::{Agent, AgentKind, ExecutionContext};
use crate::core::{ConductorError, Result, Session, StepResult};

/// Sub-agents executed in declared order
pub struct SequentialAgent {
    agents: Vec<Arc<Agent>>,
}

/// Builder for sequential composites
pub struct SequentialAgentBuilder {
    name: String,
    agents: Vec<Arc<Agent>>,
}

impl SequentialAgentBuilder {
    /// Create a new builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
        }
    }

    /// Append a sub-agent
    pub fn agent(mut self, agent: Arc<Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Append several sub-agents
    pub fn agents(mut self, agents: impl IntoIterator<Item = Arc<Agent>>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Build the composite; fails on an empty list
    pub fn build(self) -> Result<Agent> {
        if self.agents.is_empty() {
            return Err(ConductorError::invalid_graph(format!(
                "sequential agent '{}' has no sub-agents",
                self.name
            )));
        }
        Agent::new(
            self.name,
            AgentKind::Sequential(SequentialAgent {
                agents: self.agents,
            }),
        )
    }
}

impl SequentialAgent {
    /// Create a builder
    pub fn builder(name: impl Into<String>) -> SequentialAgentBuilder {
        SequentialAgentBuilder::new(name)
    }

    /// Sub-agents in declared order
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
        let mut current = input;
        for (position, agent) in self.agents.iter().enumerate() {
            tracing::debug!(sequence = name, position, agent = agent.name(), "sequential step");
            let step = agent.execute(current, session, ctx).await?;
            current = step.output;
        }
        Ok(StepResult::success(name, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fn_agent;
    use crate::agent::test_support::*;
    use crate::llm::ScriptedModel;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn add_one(name: &str) -> Arc<Agent> {
        fn_agent(name, |input, _| Ok(json!(input.as_i64().unwrap_or(0) + 1)))
            .unwrap()
            .shared()
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let err = SequentialAgent::builder("empty").build().unwrap_err();
        assert!(matches!(err, ConductorError::InvalidGraph(_)));
    }

    #[tokio::test]
    async fn test_output_threads_through() {
        let seq = SequentialAgent::builder("chain")
            .agents([add_one("a"), add_one("b"), add_one("c")])
            .build()
            .unwrap();
        let ctx = context_with(ScriptedModel::new(), ToolRegistry::new(), quiet_config());
        let mut session = Session::new();

        let step = seq.execute(json!(0), &mut session, &ctx).await.unwrap();

        assert_eq!(step.agent, "chain");
        assert_eq!(step.output, json!(3));
        let agents: Vec<_> = ctx.trace().snapshot().into_iter().map(|s| s.agent).collect();
        assert_eq!(agents, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_later_step_sees_earlier_session_writes() {
        let writer = fn_agent("writer", |_, _| Ok(json!({"draft": "v1"}))).unwrap().shared();
        let reader = fn_agent("reader", |_, session| {
            Ok(json!({ "seen": session.get_str("draft").unwrap_or("none") }))
        })
        .unwrap()
        .shared();
        let seq = SequentialAgent::builder("pair")
            .agent(writer)
            .agent(reader)
            .build()
            .unwrap();
        let ctx = context_with(ScriptedModel::new(), ToolRegistry::new(), quiet_config());
        let mut session = Session::new();

        let step = seq.execute(json!(null), &mut session, &ctx).await.unwrap();

        assert_eq!(step.output, json!({"seen": "v1"}));
    }
}
