//! Tool registry - registers tools and dispatches tool calls
//!
//! Central hub mapping tool names to a closed set of handlers: plain
//! capabilities and nested agents. Arguments and results are checked against
//! the declared schemas on every call.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::{Agent, ExecutionContext};
use crate::core::{ConductorError, Result, SchemaDirection, Session, ToolDefinition};
use crate::tools::capability::{ToolCapability, ToolContext};
use crate::tools::schema;

/// What runs when a tool is invoked
#[derive(Clone)]
pub enum ToolHandler {
    /// A capability (closure or trait object)
    Function(Arc<dyn ToolCapability>),
    /// A whole agent, invoked as a tool
    Agent(Arc<Agent>),
}

/// A registered tool
#[derive(Clone)]
pub struct Tool {
    /// Unique tool name
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// Schema the arguments must satisfy
    pub input_schema: Value,
    /// Schema the result must satisfy
    pub output_schema: Value,
    /// Handler invoked on a call
    pub handler: ToolHandler,
}

impl Tool {
    /// Create a capability-backed tool
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
        capability: Arc<dyn ToolCapability>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
            handler: ToolHandler::Function(capability),
        }
    }

    /// Wrap an agent as a tool.
    ///
    /// The agent receives `args.request` when present, otherwise the whole
    /// argument object.
    pub fn agent(name: impl Into<String>, agent: Arc<Agent>) -> Self {
        Self {
            name: name.into(),
            description: agent.description().to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "request": {
                        "type": "string",
                        "description": "The request to delegate"
                    }
                }
            }),
            output_schema: json!({}),
            handler: ToolHandler::Agent(agent),
        }
    }

    /// Model-facing definition of this tool
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(&self.name, &self.description, self.input_schema.clone())
    }

    /// The wrapped agent, for nested agent-tools
    pub fn nested_agent(&self) -> Option<&Arc<Agent>> {
        match &self.handler {
            ToolHandler::Agent(agent) => Some(agent),
            ToolHandler::Function(_) => None,
        }
    }
}

/// Registry of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
        capability: Arc<dyn ToolCapability>,
    ) -> Result<()> {
        let name = name.into();
        self.register_tool(Tool::function(
            name.clone(),
            name,
            input_schema,
            output_schema,
            capability,
        ))
    }

    /// Register a fully described tool
    pub fn register_tool(&mut self, tool: Tool) -> Result<()> {
        if self.tools.contains_key(&tool.name) {
            return Err(ConductorError::DuplicateTool(tool.name));
        }
        tracing::debug!(tool = %tool.name, "registered tool");
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Register an agent as a tool under `name`
    pub fn register_agent(&mut self, name: impl Into<String>, agent: Arc<Agent>) -> Result<()> {
        self.register_tool(Tool::agent(name, agent))
    }

    /// Look up a tool by name
    pub fn resolve(&self, name: &str) -> Result<&Tool> {
        self.tools
            .get(name)
            .ok_or_else(|| ConductorError::UnknownTool(name.to_string()))
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions for the given tool names, in the given order
    pub fn definitions(&self, names: &[String]) -> Result<Vec<ToolDefinition>> {
        names
            .iter()
            .map(|name| self.resolve(name).map(Tool::definition))
            .collect()
    }

    /// Execute a tool call.
    ///
    /// Arguments are checked against the input schema before the handler runs
    /// and the result against the output schema afterwards. Handler failures
    /// become `ToolExecution` errors; cancellation and timeouts pass through.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        session: &mut Session,
        exec: &ExecutionContext,
    ) -> Result<Value> {
        let tool = self.resolve(name)?;

        schema::validate(&tool.input_schema, &args)
            .map_err(|reason| ConductorError::schema(name, SchemaDirection::Input, reason))?;

        tracing::debug!(tool = name, "invoking tool");

        let output = match &tool.handler {
            ToolHandler::Function(capability) => {
                let mut ctx = ToolContext::new(name, session, exec);
                exec.guard(capability.call(args, &mut ctx))
                    .await
                    .map_err(|e| as_tool_error(name, e))?
            }
            ToolHandler::Agent(agent) => {
                let input = match args.get("request") {
                    Some(request) => request.clone(),
                    None => args,
                };
                agent
                    .execute(input, session, exec)
                    .await
                    .map(|step| step.output)
                    .map_err(|e| as_tool_error(name, e))?
            }
        };

        schema::validate(&tool.output_schema, &output)
            .map_err(|reason| ConductorError::schema(name, SchemaDirection::Output, reason))?;

        Ok(output)
    }
}

fn as_tool_error(name: &str, error: ConductorError) -> ConductorError {
    match error {
        e if e.is_control() => e,
        ConductorError::ToolExecution { tool, message } if tool == name => {
            ConductorError::ToolExecution { tool, message }
        }
        other => ConductorError::tool(name, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::capability::tool_fn;

    fn echo() -> Arc<dyn ToolCapability> {
        tool_fn(Ok)
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register("echo", json!({}), json!({}), echo()).unwrap();

        let err = registry
            .register("echo", json!({}), json!({}), echo())
            .unwrap_err();
        assert!(matches!(err, ConductorError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.resolve("missing"),
            Err(ConductorError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_definitions_keep_requested_order() {
        let mut registry = ToolRegistry::new();
        registry.register("b", json!({"type": "object"}), json!({}), echo()).unwrap();
        registry.register("a", json!({"type": "object"}), json!({}), echo()).unwrap();

        let defs = registry
            .definitions(&["a".to_string(), "b".to_string()])
            .unwrap();
        let names: Vec<_> = defs.iter().map(|d| d.function.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(defs[0].tool_type, "function");
    }

    #[test]
    fn test_tool_error_wrapping() {
        let wrapped = as_tool_error("t", ConductorError::model("inner", "down"));
        assert!(matches!(wrapped, ConductorError::ToolExecution { ref tool, .. } if tool == "t"));

        let control = as_tool_error("t", ConductorError::Cancelled);
        assert!(matches!(control, ConductorError::Cancelled));
    }
}
