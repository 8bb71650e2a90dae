//! Pipeline composition and graph validation
//!
//! The composer owns the tool registry while a pipeline is being assembled.
//! Agents reach each other through two kinds of edges: sub-agents of a
//! composite, and agent-tools declared by an LLM agent. Only the second kind
//! can close a cycle, so every agent-tool registration and the final `build`
//! walk the whole graph.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::agent::Agent;
use crate::core::{ConductorError, Result};
use crate::tools::{Tool, ToolCapability, ToolRegistry};

/// A validated agent graph plus the tools it may call
#[derive(Clone)]
pub struct Pipeline {
    root: Arc<Agent>,
    tools: Arc<ToolRegistry>,
}

impl Pipeline {
    /// Root agent
    pub fn root(&self) -> &Arc<Agent> {
        &self.root
    }

    /// Tool registry
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("root", &self.root)
            .field("tools", &self.tools.len())
            .finish()
    }
}

/// Assembles pipelines
#[derive(Clone, Default)]
pub struct Composer {
    registry: ToolRegistry,
}

impl Composer {
    /// Create a composer with an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability tool
    pub fn register_tool(
        &mut self,
        name: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
        capability: Arc<dyn ToolCapability>,
    ) -> Result<&mut Self> {
        self.registry
            .register(name, input_schema, output_schema, capability)?;
        Ok(self)
    }

    /// Register a fully described tool
    pub fn register(&mut self, tool: Tool) -> Result<&mut Self> {
        self.registry.register_tool(tool)?;
        Ok(self)
    }

    /// Expose `agent` as a tool named `name`.
    ///
    /// Fails with `CyclicGraph` when the agent can reach a caller of `name`.
    pub fn register_agent_tool(
        &mut self,
        name: impl Into<String>,
        agent: Arc<Agent>,
    ) -> Result<&mut Self> {
        let mut candidate = self.registry.clone();
        candidate.register_agent(name, agent.clone())?;
        GraphWalker::new(&candidate, false).walk(&agent)?;
        self.registry = candidate;
        Ok(self)
    }

    /// Registry assembled so far
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Validate the graph under `root` and produce a runnable pipeline
    pub fn build(self, root: Arc<Agent>) -> Result<Pipeline> {
        GraphWalker::new(&self.registry, true).walk(&root)?;
        tracing::debug!(root = root.name(), tools = self.registry.len(), "pipeline built");
        Ok(Pipeline {
            root,
            tools: Arc::new(self.registry),
        })
    }
}

/// Depth-first walk over sub-agent and agent-tool edges
struct GraphWalker<'a> {
    registry: &'a ToolRegistry,
    require_tools: bool,
    path: Vec<String>,
    on_path: HashSet<*const Agent>,
    done: HashSet<*const Agent>,
}

impl<'a> GraphWalker<'a> {
    fn new(registry: &'a ToolRegistry, require_tools: bool) -> Self {
        Self {
            registry,
            require_tools,
            path: Vec::new(),
            on_path: HashSet::new(),
            done: HashSet::new(),
        }
    }

    fn walk(&mut self, root: &Arc<Agent>) -> Result<()> {
        self.visit(root, root.name().to_string())
    }

    fn visit(&mut self, agent: &Arc<Agent>, label: String) -> Result<()> {
        let id = Arc::as_ptr(agent);
        if self.done.contains(&id) {
            return Ok(());
        }
        if self.on_path.contains(&id) {
            self.path.push(label);
            return Err(ConductorError::CyclicGraph(self.path.join(" -> ")));
        }

        self.on_path.insert(id);
        self.path.push(label);

        for child in agent.children() {
            self.visit(child, child.name().to_string())?;
        }

        for tool_name in agent.tool_names() {
            match self.registry.resolve(tool_name) {
                Ok(tool) => {
                    if let Some(nested) = tool.nested_agent() {
                        self.visit(nested, format!("{} (tool '{}')", nested.name(), tool_name))?;
                    }
                }
                Err(e) if self.require_tools => return Err(e),
                Err(_) => {}
            }
        }

        self.path.pop();
        self.on_path.remove(&id);
        self.done.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{fn_agent, LlmAgent, SequentialAgent};
    use crate::tools::tool_fn;
    use serde_json::json;

    #[test]
    fn test_build_rejects_unknown_tool() {
        let agent = LlmAgent::builder("a").tool("missing").build().unwrap().shared();
        let err = Composer::new().build(agent).unwrap_err();
        assert!(matches!(err, ConductorError::UnknownTool(name) if name == "missing"));
    }

    #[test]
    fn test_build_accepts_registered_tool() {
        let mut composer = Composer::new();
        composer
            .register_tool("echo", json!({}), json!({}), tool_fn(Ok))
            .unwrap();
        let agent = LlmAgent::builder("a").tool("echo").build().unwrap().shared();

        let pipeline = composer.build(agent).unwrap();
        assert_eq!(pipeline.tools().len(), 1);
        assert_eq!(pipeline.root().name(), "a");
    }

    #[test]
    fn test_agent_tool_cycle_detected() {
        // `caller` delegates to `helper`, and `helper` is wrapped by a sequence
        // that is itself exposed under the tool `caller` uses.
        let caller = LlmAgent::builder("caller").tool("delegate").build().unwrap().shared();
        let wrapper = SequentialAgent::builder("wrapper")
            .agent(caller)
            .build()
            .unwrap()
            .shared();

        let mut composer = Composer::new();
        let err = composer
            .register_agent_tool("delegate", wrapper)
            .err()
            .unwrap();

        match err {
            ConductorError::CyclicGraph(path) => {
                assert!(path.starts_with("wrapper -> caller -> wrapper"), "{path}");
            }
            other => panic!("expected cycle, got {other}"),
        }
        assert!(composer.registry().is_empty());
    }

    #[test]
    fn test_shared_subtree_is_not_a_cycle() {
        let leaf = fn_agent("leaf", |input, _| Ok(input)).unwrap().shared();
        let root = SequentialAgent::builder("twice")
            .agent(leaf.clone())
            .agent(leaf)
            .build()
            .unwrap()
            .shared();

        assert!(Composer::new().build(root).is_ok());
    }

    #[test]
    fn test_nested_agent_tool_accepted() {
        let helper = fn_agent("helper", |input, _| Ok(json!({ "helped": input })))
            .unwrap()
            .shared();
        let caller = LlmAgent::builder("caller").tool("help").build().unwrap().shared();

        let mut composer = Composer::new();
        composer.register_agent_tool("help", helper).unwrap();
        let pipeline = composer.build(caller).unwrap();

        assert!(pipeline.tools().resolve("help").unwrap().nested_agent().is_some());
    }
}
