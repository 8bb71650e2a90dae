//! Shared types used across conductor modules
//!
//! Contains message structures, tool definitions and step results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::ConductorError;

/// A message exchanged with a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: String,
    /// Content of the message
    pub content: String,
    /// Optional tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Definition of a tool as presented to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Outcome of one agent execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Name of the agent that produced this result
    pub agent: String,
    /// Output value (null for failures)
    pub output: Value,
    /// Whether the execution succeeded
    pub success: bool,
    /// Error detail for failures, or a summary of tolerated branch failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Iterations performed, set for loop results only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
}

impl StepResult {
    /// Create a successful result
    pub fn success(agent: impl Into<String>, output: Value) -> Self {
        Self {
            agent: agent.into(),
            output,
            success: true,
            error: None,
            iterations: None,
        }
    }

    /// Create a failed result from an error
    pub fn failure(agent: impl Into<String>, error: &ConductorError) -> Self {
        Self {
            agent: agent.into(),
            output: Value::Null,
            success: false,
            error: Some(error.to_string()),
            iterations: None,
        }
    }

    /// Attach an iteration count
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Attach an error summary without marking the result failed
    pub fn with_error_summary(mut self, summary: impl Into<String>) -> Self {
        self.error = Some(summary.into());
        self
    }
}

/// Render a JSON value the way prompts and tool messages expect:
/// strings raw, everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_result_serialization_skips_empty_fields() {
        let step = StepResult::success("a", json!({"x": 1}));
        let encoded = serde_json::to_value(&step).unwrap();
        assert_eq!(encoded, json!({"agent": "a", "output": {"x": 1}, "success": true}));
    }

    #[test]
    fn test_failure_carries_message() {
        let step = StepResult::failure("b", &ConductorError::Cancelled);
        assert!(!step.success);
        assert_eq!(step.error.as_deref(), Some("Run cancelled"));
        assert_eq!(step.output, Value::Null);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("hi")), "hi");
        assert_eq!(value_to_text(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
