//! Model-driven leaf agent
//!
//! Renders its instruction against the step input and the session, asks the
//! model client for a response and executes the tool calls the model requests,
//! feeding every observation back on the next invoke. The step ends when the
//! model answers without tool calls.

use serde_json::Value;

use crate::agent::{Agent, AgentKind, ExecutionContext, StepState};
use crate::core::{value_to_text, ConductorError, Result, Session, StepResult, ToolCall};
use crate::llm::{ModelContext, ModelResponse, Observation};

/// Leaf agent backed by the model client
#[derive(Debug, Clone)]
pub struct LlmAgent {
    instruction: String,
    model: Option<String>,
    tools: Vec<String>,
    catch_tool_errors: bool,
    temperature: Option<f32>,
}

/// Builder for LLM agents
pub struct LlmAgentBuilder {
    name: String,
    instruction: Option<String>,
    model: Option<String>,
    tools: Vec<String>,
    catch_tool_errors: bool,
    temperature: Option<f32>,
}

impl LlmAgentBuilder {
    /// Create a new builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: None,
            model: None,
            tools: Vec::new(),
            catch_tool_errors: false,
            temperature: None,
        }
    }

    /// Set the instruction template (`{input}` and `{session_key}` placeholders)
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Set the model to use
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Declare a tool the agent may call
    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    /// Declare several tools
    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(names.into_iter().map(Into::into));
        self
    }

    /// Report tool failures to the model instead of failing the step
    pub fn catch_tool_errors(mut self, catch: bool) -> Self {
        self.catch_tool_errors = catch;
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the agent
    pub fn build(self) -> Result<Agent> {
        let instruction = self.instruction.unwrap_or_else(|| {
            format!(
                "You are a helpful agent named '{}'. Complete this task: {{input}}",
                self.name
            )
        });

        let mut tools: Vec<String> = Vec::with_capacity(self.tools.len());
        for tool in self.tools {
            if tools.contains(&tool) {
                return Err(ConductorError::invalid_graph(format!(
                    "agent '{}' declares tool '{}' twice",
                    self.name, tool
                )));
            }
            tools.push(tool);
        }

        Agent::new(
            self.name,
            AgentKind::Llm(LlmAgent {
                instruction,
                model: self.model,
                tools,
                catch_tool_errors: self.catch_tool_errors,
                temperature: self.temperature,
            }),
        )
    }
}

impl LlmAgent {
    /// Create a builder
    pub fn builder(name: impl Into<String>) -> LlmAgentBuilder {
        LlmAgentBuilder::new(name)
    }

    /// Instruction template
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Declared tool names
    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub(crate) async fn run(
        &self,
        name: &str,
        input: Value,
        session: &mut Session,
        ctx: &ExecutionContext,
    ) -> Result<StepResult> {
        let tools = ctx.tools().definitions(&self.tools)?;
        let limit = ctx.config().max_tool_calls_per_step;
        let mut state = StepState::new(limit);

        loop {
            let prompt = render(&self.instruction, &input, session);
            let context = ModelContext {
                agent: name.to_string(),
                model: self
                    .model
                    .clone()
                    .unwrap_or_else(|| ctx.default_model().to_string()),
                input: input.clone(),
                tools: tools.clone(),
                observations: state.observations.clone(),
                session: session.to_value(),
                temperature: self.temperature,
            };

            let response = self.invoke_model(name, &prompt, &context, ctx).await?;

            if !response.wants_tools() {
                tracing::debug!(agent = name, tool_calls = state.calls, "step finished");
                return Ok(StepResult::success(name, parse_output(&response.content)));
            }

            for call in response.tool_calls {
                if !state.take_call() {
                    return Err(ConductorError::ToolCallLimit {
                        agent: name.to_string(),
                        limit,
                    });
                }

                let observation = match self.call_tool(&call, session, ctx).await {
                    Ok(output) => Observation::success(&call.name, call.arguments, output),
                    Err(e) if self.catch_tool_errors && !e.is_cancelled() => {
                        tracing::warn!(agent = name, tool = %call.name, error = %e, "tool failed, reporting to model");
                        Observation::error(&call.name, call.arguments, e.to_string())
                    }
                    Err(e) => return Err(e),
                };
                state.observe(observation);
            }
        }
    }

    async fn invoke_model(
        &self,
        name: &str,
        prompt: &str,
        context: &ModelContext,
        ctx: &ExecutionContext,
    ) -> Result<ModelResponse> {
        let retry = ctx.config().retry;
        let mut attempt = 0;
        loop {
            let result = ctx
                .guard(ctx.model().invoke(prompt, context))
                .await
                .map_err(|e| as_model_error(name, e));

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(agent = name, attempt, error = %e, "retrying model call");
                    ctx.pause(retry.delay()).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_tool(
        &self,
        call: &ToolCall,
        session: &mut Session,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        if !self.tools.contains(&call.name) {
            return Err(ConductorError::UnknownTool(call.name.clone()));
        }

        let retry = ctx.config().retry;
        let mut attempt = 0;
        loop {
            match ctx
                .tools()
                .invoke(&call.name, call.arguments.clone(), session, ctx)
                .await
            {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(tool = %call.name, attempt, error = %e, "retrying tool call");
                    ctx.pause(retry.delay()).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn as_model_error(agent: &str, error: ConductorError) -> ConductorError {
    match error {
        e if e.is_control() => e,
        e @ ConductorError::ModelInvocation { .. } => e,
        other => ConductorError::model(agent, other.to_string()),
    }
}

/// Substitute `{input}` and `{session_key}` placeholders.
///
/// A trailing `?` (`{key?}`) renders a missing key as the empty string;
/// other unknown placeholders stay verbatim.
pub fn render(template: &str, input: &Value, session: &Session) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let token = &after[..end];
        let (key, optional) = match token.strip_suffix('?') {
            Some(key) => (key, true),
            None => (token, false),
        };

        if !is_identifier(key) {
            // Not a placeholder (JSON in the prompt, for example)
            out.push('{');
            rest = after;
            continue;
        }

        if key == "input" {
            out.push_str(&value_to_text(input));
        } else if let Some(value) = session.get(key) {
            out.push_str(&value_to_text(value));
        } else if !optional {
            out.push_str(&rest[start..start + end + 2]);
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Interpret a final response: JSON when it parses, otherwise the text itself.
/// A surrounding markdown code fence is ignored.
pub fn parse_output(content: &str) -> Value {
    let trimmed = strip_fence(content.trim());
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(content.to_string()))
}

fn strip_fence(text: &str) -> &str {
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    let body = body.strip_prefix("json").unwrap_or(body);
    body.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::*;
    use crate::core::{RetryPolicy, RunConfig};
    use crate::llm::ScriptedModel;
    use crate::tools::{tool_fn, tool_fn_with_session, ToolRegistry};
    use serde_json::json;

    fn greet_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "greet_user",
                json!({"type": "object", "required": ["name"]}),
                json!({"type": "string"}),
                tool_fn(|args| {
                    let name = args["name"].as_str().unwrap_or("friend");
                    Ok(json!(format!("Hello, {}!", name)))
                }),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_render_placeholders() {
        let mut session = Session::new();
        session.set("topic", json!("rust"));
        session.set("count", json!(3));

        let rendered = render(
            "Write about {topic} ({count}) for {input}. Keep {missing} and {note?}.",
            &json!("me"),
            &session,
        );
        assert_eq!(rendered, "Write about rust (3) for me. Keep {missing} and .");
    }

    #[test]
    fn test_render_leaves_json_braces() {
        let rendered = render(r#"Reply as {"ok": true} for {input}"#, &json!({"a": 1}), &Session::new());
        assert_eq!(rendered, r#"Reply as {"ok": true} for {"a":1}"#);
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output(r#"{"y": 2}"#), json!({"y": 2}));
        assert_eq!(parse_output("```json\n{\"y\": 2}\n```"), json!({"y": 2}));
        assert_eq!(parse_output("plain text"), json!("plain text"));
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let model = ScriptedModel::new()
            .tool_then_echo("greeter", "greet_user", |_| json!({"name": "Alice"}));
        let agent = LlmAgent::builder("greeter")
            .instruction("Greet {input}")
            .tool("greet_user")
            .build()
            .unwrap();
        let ctx = context_with(model, greet_registry(), quiet_config());
        let mut session = Session::new();

        let step = agent.execute(json!("Alice"), &mut session, &ctx).await.unwrap();

        assert_eq!(step.output, json!("Hello, Alice!"));
    }

    #[tokio::test]
    async fn test_undeclared_tool_is_unknown() {
        let model = ScriptedModel::new().queue(
            "greeter",
            vec![ModelResponse::tool_call("greet_user", json!({"name": "Bob"}))],
        );
        let agent = LlmAgent::builder("greeter").build().unwrap();
        let ctx = context_with(model, greet_registry(), quiet_config());
        let mut session = Session::new();

        let err = agent.execute(json!(null), &mut session, &ctx).await.unwrap_err();
        assert!(matches!(err, ConductorError::UnknownTool(name) if name == "greet_user"));
    }

    #[tokio::test]
    async fn test_tool_call_limit() {
        let model = ScriptedModel::new().queue(
            "greeter",
            vec![ModelResponse::tool_call("greet_user", json!({"name": "Bob"}))],
        );
        let agent = LlmAgent::builder("greeter").tool("greet_user").build().unwrap();
        let config = RunConfig {
            max_tool_calls_per_step: 2,
            ..quiet_config()
        };
        let ctx = context_with(model, greet_registry(), config);
        let mut session = Session::new();

        let err = agent.execute(json!(null), &mut session, &ctx).await.unwrap_err();
        assert!(matches!(err, ConductorError::ToolCallLimit { limit: 2, .. }));
    }

    #[tokio::test]
    async fn test_schema_violation_caught_as_observation() {
        let model = ScriptedModel::new().tool_then_echo("greeter", "greet_user", |_| json!({}));
        let agent = LlmAgent::builder("greeter")
            .tool("greet_user")
            .catch_tool_errors(true)
            .build()
            .unwrap();
        let ctx = context_with(model, greet_registry(), quiet_config());
        let mut session = Session::new();

        let step = agent.execute(json!(null), &mut session, &ctx).await.unwrap();

        let error = step.output["error"].as_str().unwrap();
        assert!(error.contains("Schema mismatch"));
    }

    #[tokio::test]
    async fn test_schema_violation_fails_step_by_default() {
        let model = ScriptedModel::new().tool_then_echo("greeter", "greet_user", |_| json!({}));
        let agent = LlmAgent::builder("greeter").tool("greet_user").build().unwrap();
        let ctx = context_with(model, greet_registry(), quiet_config());
        let mut session = Session::new();

        let err = agent.execute(json!(null), &mut session, &ctx).await.unwrap_err();
        assert!(matches!(err, ConductorError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn test_tool_writes_session() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "remember",
                json!({"type": "object"}),
                json!({}),
                tool_fn_with_session(|args, session| {
                    session.set("memo", args["text"].clone());
                    Ok(json!("stored"))
                }),
            )
            .unwrap();
        let model = ScriptedModel::new()
            .tool_then_echo("scribe", "remember", |_| json!({"text": "buy milk"}));
        let agent = LlmAgent::builder("scribe").tool("remember").build().unwrap();
        let ctx = context_with(model, registry, quiet_config());
        let mut session = Session::new();

        agent.execute(json!(null), &mut session, &ctx).await.unwrap();

        assert_eq!(session.get_str("memo"), Some("buy milk"));
    }

    #[tokio::test]
    async fn test_model_failure_retried() {
        let attempts = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = attempts.clone();
        let model = ScriptedModel::new().on("flaky", move |_, _| {
            if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Err(ConductorError::model("flaky", "overloaded"))
            } else {
                Ok(ModelResponse::json(json!({"ok": true})))
            }
        });
        let agent = LlmAgent::builder("flaky").build().unwrap();
        let config = RunConfig {
            retry: RetryPolicy {
                max_retries: 1,
                delay_ms: 1,
            },
            ..quiet_config()
        };
        let ctx = context_with(model, ToolRegistry::new(), config);
        let mut session = Session::new();

        let step = agent.execute(json!(null), &mut session, &ctx).await.unwrap();

        assert_eq!(step.output, json!({"ok": true}));
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_model_failure_without_retry() {
        let model = ScriptedModel::new().fail("down", "connection refused");
        let agent = LlmAgent::builder("down").build().unwrap();
        let ctx = context_with(model, ToolRegistry::new(), quiet_config());
        let mut session = Session::new();

        let err = agent.execute(json!(null), &mut session, &ctx).await.unwrap_err();
        assert!(matches!(err, ConductorError::ModelInvocation { ref agent, .. } if agent == "down"));
    }

    #[test]
    fn test_duplicate_tool_declaration_rejected() {
        let err = LlmAgent::builder("a").tool("t").tool("t").build().unwrap_err();
        assert!(matches!(err, ConductorError::InvalidGraph(_)));
    }
}
