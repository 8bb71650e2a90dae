//! Model client trait for abstracting different backends
//!
//! Agents only ever see `ModelClient::invoke`; swapping Ollama for a scripted
//! model (or any other vendor) does not touch the orchestration code.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{Result, ToolCall, ToolDefinition};

/// Response from a model client
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    /// Text content of the response
    pub content: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

impl ModelResponse {
    /// A plain text answer
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// A JSON answer, serialized as text
    pub fn json(value: Value) -> Self {
        Self::text(value.to_string())
    }

    /// A request to call a single tool
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_calls: vec![ToolCall::new(name, arguments)],
            ..Default::default()
        }
    }

    /// Whether the model asked for tools
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of one tool call, fed back to the model on the next invoke
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Name of the tool that produced this observation
    pub tool_name: String,
    /// Arguments the tool was called with
    pub arguments: Value,
    /// Whether the tool execution was successful
    pub success: bool,
    /// Tool output, or `{"error": ...}` for caught failures
    pub output: Value,
}

impl Observation {
    /// Create a successful observation
    pub fn success(tool_name: impl Into<String>, arguments: Value, output: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            success: true,
            output,
        }
    }

    /// Create an error observation
    pub fn error(tool_name: impl Into<String>, arguments: Value, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            success: false,
            output: serde_json::json!({ "error": error.into() }),
        }
    }
}

/// Everything a model client gets besides the rendered prompt
#[derive(Debug, Clone)]
pub struct ModelContext {
    /// Name of the calling agent
    pub agent: String,
    /// Model requested by the agent
    pub model: String,
    /// The step input
    pub input: Value,
    /// Tools the agent may call
    pub tools: Vec<ToolDefinition>,
    /// Tool results gathered earlier in this step, oldest first
    pub observations: Vec<Observation>,
    /// Snapshot of the session state
    pub session: Value,
    /// Sampling temperature, if configured
    pub temperature: Option<f32>,
}

impl ModelContext {
    /// The most recent tool observation of this step
    pub fn last_observation(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

/// Trait for model clients
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Produce a response for a rendered prompt and its context
    async fn invoke(&self, prompt: &str, context: &ModelContext) -> Result<ModelResponse>;

    /// Get the provider name
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with(observations: Vec<Observation>) -> ModelContext {
        ModelContext {
            agent: "a".into(),
            model: "m".into(),
            input: json!("hi"),
            tools: Vec::new(),
            observations,
            session: json!({}),
            temperature: None,
        }
    }

    #[test]
    fn test_last_observation_is_most_recent() {
        let ctx = context_with(vec![
            Observation::success("get_weather", json!({}), json!("sunny")),
            Observation::error("get_news", json!({}), "offline"),
        ]);

        let last = ctx.last_observation().unwrap();
        assert_eq!(last.tool_name, "get_news");
        assert!(!last.success);
    }

    #[test]
    fn test_no_observations_yet() {
        assert!(context_with(Vec::new()).last_observation().is_none());
    }
}
