//! Scripted model client
//!
//! A deterministic `ModelClient` driven by per-agent closures. Used by the
//! demo pipelines and as the model double in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{value_to_text, ConductorError, Result};
use crate::llm::traits::{ModelClient, ModelContext, ModelResponse};

type Responder = Arc<dyn Fn(&str, &ModelContext) -> Result<ModelResponse> + Send + Sync>;

/// Model client that answers from registered closures
#[derive(Clone, Default)]
pub struct ScriptedModel {
    responders: HashMap<String, Responder>,
    latencies: HashMap<String, Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    /// Create a scripted model with no responders.
    ///
    /// Agents without a responder get their prompt echoed back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls from `agent` with a closure
    pub fn on<F>(mut self, agent: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&str, &ModelContext) -> Result<ModelResponse> + Send + Sync + 'static,
    {
        self.responders.insert(agent.into(), Arc::new(responder));
        self
    }

    /// Answer calls from `agent` with a fixed sequence; the last entry repeats
    pub fn queue(self, agent: impl Into<String>, responses: Vec<ModelResponse>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        self.on(agent, move |_, _| {
            let mut queue = queue.lock();
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            next.ok_or_else(|| ConductorError::Other("scripted queue is empty".to_string()))
        })
    }

    /// Always answer `agent` with the same JSON value
    pub fn reply_json(self, agent: impl Into<String>, value: Value) -> Self {
        self.on(agent, move |_, _| Ok(ModelResponse::json(value.clone())))
    }

    /// Always fail calls from `agent`
    pub fn fail(self, agent: impl Into<String>, message: impl Into<String>) -> Self {
        let agent = agent.into();
        let message = message.into();
        let name = agent.clone();
        self.on(agent, move |_, _| Err(ConductorError::model(&name, &message)))
    }

    /// Call one tool with arguments derived from the context, then answer with
    /// the tool's output
    pub fn tool_then_echo<F>(self, agent: impl Into<String>, tool: impl Into<String>, args: F) -> Self
    where
        F: Fn(&ModelContext) -> Value + Send + Sync + 'static,
    {
        let tool = tool.into();
        self.on(agent, move |_, ctx| match ctx.last_observation() {
            None => Ok(ModelResponse::tool_call(&tool, args(ctx))),
            Some(obs) => Ok(ModelResponse::text(value_to_text(&obs.output))),
        })
    }

    /// Delay every response to `agent`
    pub fn with_latency(mut self, agent: impl Into<String>, latency: Duration) -> Self {
        self.latencies.insert(agent.into(), latency);
        self
    }

    /// Agent names in the order their calls arrived
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn invoke(&self, prompt: &str, context: &ModelContext) -> Result<ModelResponse> {
        self.calls.lock().push(context.agent.clone());

        if let Some(latency) = self.latencies.get(&context.agent) {
            tokio::time::sleep(*latency).await;
        }

        let mut response = match self.responders.get(&context.agent) {
            Some(responder) => responder(prompt, context)?,
            None => ModelResponse::text(prompt),
        };
        if response.model.is_empty() {
            response.model = context.model.clone();
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
