//! Error types for conductor
//!
//! One error enum covers validation, external-call and control failures.
//! `RunError` wraps the failure that terminated a run together with the trace
//! recorded up to that point.

use thiserror::Error;
use uuid::Uuid;

use crate::core::types::StepResult;

/// Main error type for conductor operations
#[derive(Error, Debug)]
pub enum ConductorError {
    /// A tool with this name is already registered
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// No tool with this name is registered (or the agent did not declare it)
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments or results violate the declared schema
    #[error("Schema mismatch for {direction} of tool '{tool}': {reason}")]
    SchemaMismatch {
        tool: String,
        direction: SchemaDirection,
        reason: String,
    },

    /// The model client failed
    #[error("Model invocation failed for agent '{agent}': {message}")]
    ModelInvocation { agent: String, message: String },

    /// A tool capability (or a nested agent) failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The model kept requesting tools past the per-step bound
    #[error("Agent '{agent}' exceeded {limit} tool calls in one step")]
    ToolCallLimit { agent: String, limit: usize },

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// A step or the whole run took too long
    #[error("{scope} timed out after {after_ms}ms")]
    Timeout { scope: String, after_ms: u64 },

    /// The agent graph contains a cycle (through agent-tools)
    #[error("Cyclic agent graph: {0}")]
    CyclicGraph(String),

    /// The agent graph is structurally invalid
    #[error("Invalid agent graph: {0}")]
    InvalidGraph(String),

    /// A run state transition that the state machine forbids
    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Which side of a tool call failed schema validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDirection {
    Input,
    Output,
}

impl std::fmt::Display for SchemaDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaDirection::Input => write!(f, "input"),
            SchemaDirection::Output => write!(f, "output"),
        }
    }
}

/// Convenience Result type for conductor operations
pub type Result<T> = std::result::Result<T, ConductorError>;

impl ConductorError {
    /// Create a model invocation error
    pub fn model(agent: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ModelInvocation {
            agent: agent.into(),
            message: msg.into(),
        }
    }

    /// Create a tool execution error
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema(
        tool: impl Into<String>,
        direction: SchemaDirection,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            tool: tool.into(),
            direction,
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(scope: impl Into<String>, after_ms: u64) -> Self {
        Self::Timeout {
            scope: scope.into(),
            after_ms,
        }
    }

    /// Create an invalid graph error
    pub fn invalid_graph(msg: impl Into<String>) -> Self {
        Self::InvalidGraph(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Cancellation and timeouts. Never rewrapped into tool or model errors.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout { .. })
    }

    /// Cancellation is never swallowed by an error policy; a step timeout is
    /// an ordinary failure of that step.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Failures a configured retry policy may retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelInvocation { .. } | Self::ToolExecution { .. })
    }
}

/// Fatal failure of a run
#[derive(Error, Debug)]
#[error("run {run_id} failed: {source}")]
pub struct RunError {
    /// Identifier of the failed run
    pub run_id: Uuid,
    /// The failure that reached the runner
    #[source]
    pub source: ConductorError,
    /// Every step result recorded before the run failed
    pub trace: Vec<StepResult>,
}

impl RunError {
    /// Whether the run ended because it was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, ConductorError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_errors() {
        assert!(ConductorError::Cancelled.is_control());
        assert!(ConductorError::timeout("step", 10).is_control());
        assert!(!ConductorError::tool("t", "boom").is_control());
        assert!(!ConductorError::timeout("step", 10).is_cancelled());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ConductorError::model("a", "down").is_retryable());
        assert!(ConductorError::tool("t", "boom").is_retryable());
        assert!(!ConductorError::UnknownTool("t".into()).is_retryable());
        assert!(!ConductorError::Cancelled.is_retryable());
    }

    #[test]
    fn test_schema_message() {
        let err = ConductorError::schema("echo", SchemaDirection::Input, "missing 'text'");
        assert_eq!(
            err.to_string(),
            "Schema mismatch for input of tool 'echo': missing 'text'"
        );
    }
}
