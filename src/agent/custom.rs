//! Custom agents
//!
//! Leaves with hand-written logic, such as a checker that decides whether a
//! loop should stop or a formatter that reshapes an upstream result. They read
//! the session and return an output; they never call the model.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::agent::{Agent, AgentKind, ExecutionContext};
use crate::core::{Result, Session, StepResult};

/// Logic of a custom agent
#[async_trait]
pub trait AgentBehavior: Send + Sync {
    /// Produce the step output from the input and the current session
    async fn run(&self, input: Value, session: &Session) -> Result<Value>;
}

/// Leaf agent backed by an [`AgentBehavior`]
#[derive(Clone)]
pub struct CustomAgent {
    behavior: Arc<dyn AgentBehavior>,
}

impl CustomAgent {
    /// Create an agent node running `behavior`
    pub fn agent(name: impl Into<String>, behavior: Arc<dyn AgentBehavior>) -> Result<Agent> {
        Agent::new(name, AgentKind::Custom(Self { behavior }))
    }

    pub(crate) async fn run(
        &self,
        name: &str,
        input: Value,
        session: &mut Session,
        ctx: &ExecutionContext,
    ) -> Result<StepResult> {
        let output = ctx.guard(self.behavior.run(input, session)).await?;
        Ok(StepResult::success(name, output))
    }
}

struct FnBehavior<F> {
    func: F,
}

#[async_trait]
impl<F> AgentBehavior for FnBehavior<F>
where
    F: Fn(Value, &Session) -> Result<Value> + Send + Sync,
{
    async fn run(&self, input: Value, session: &Session) -> Result<Value> {
        (self.func)(input, session)
    }
}

/// Build a custom agent from a closure
pub fn fn_agent<F>(name: impl Into<String>, func: F) -> Result<Agent>
where
    F: Fn(Value, &Session) -> Result<Value> + Send + Sync + 'static,
{
    CustomAgent::agent(name, Arc::new(FnBehavior { func }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::*;
    use crate::core::ConductorError;
    use crate::llm::ScriptedModel;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    struct Checker;

    #[async_trait]
    impl AgentBehavior for Checker {
        async fn run(&self, _input: Value, session: &Session) -> Result<Value> {
            let approved = session.get_str("status") == Some("approved");
            Ok(json!({ "stop": approved }))
        }
    }

    #[tokio::test]
    async fn test_behavior_reads_session() {
        let agent = CustomAgent::agent("checker", Arc::new(Checker)).unwrap();
        let ctx = context_with(ScriptedModel::new(), ToolRegistry::new(), quiet_config());
        let mut session = Session::new();
        session.set("status", json!("approved"));

        let step = agent.execute(json!(null), &mut session, &ctx).await.unwrap();

        assert_eq!(step.output, json!({"stop": true}));
        assert_eq!(session.get("stop"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_failure_recorded() {
        let agent = fn_agent("broken", |_, _| Err(ConductorError::Other("boom".into()))).unwrap();
        let ctx = context_with(ScriptedModel::new(), ToolRegistry::new(), quiet_config());
        let mut session = Session::new();

        let err = agent.execute(json!(null), &mut session, &ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        let trace = ctx.trace().snapshot();
        assert_eq!(trace[0].error.as_deref(), Some("boom"));
    }
}
