//! Tool capabilities
//!
//! The callable half of a tool. Capabilities receive validated arguments and a
//! `ToolContext` that exposes the run's session state.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::agent::ExecutionContext;
use crate::core::{Result, Session};

/// What a tool sees of the run it is called from
pub struct ToolContext<'a> {
    /// Name the tool was invoked under
    pub tool_name: &'a str,
    /// Session state of the calling step
    pub session: &'a mut Session,
    pub(crate) exec: &'a ExecutionContext,
}

impl<'a> ToolContext<'a> {
    pub(crate) fn new(
        tool_name: &'a str,
        session: &'a mut Session,
        exec: &'a ExecutionContext,
    ) -> Self {
        Self {
            tool_name,
            session,
            exec,
        }
    }

    /// Whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.exec.is_cancelled()
    }
}

/// A callable capability behind a registered tool
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Run the tool on arguments that already passed the input schema
    async fn call(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value>;
}

/// Capability backed by a plain closure
pub struct FnTool<F> {
    func: F,
}

#[async_trait]
impl<F> ToolCapability for FnTool<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    async fn call(&self, args: Value, _ctx: &mut ToolContext<'_>) -> Result<Value> {
        (self.func)(args)
    }
}

/// Capability backed by a closure that can read and write the session
pub struct SessionFnTool<F> {
    func: F,
}

#[async_trait]
impl<F> ToolCapability for SessionFnTool<F>
where
    F: Fn(Value, &mut Session) -> Result<Value> + Send + Sync,
{
    async fn call(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value> {
        (self.func)(args, &mut *ctx.session)
    }
}

/// Wrap a closure as a tool capability
pub fn tool_fn<F>(func: F) -> Arc<dyn ToolCapability>
where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnTool { func })
}

/// Wrap a session-aware closure as a tool capability
pub fn tool_fn_with_session<F>(func: F) -> Arc<dyn ToolCapability>
where
    F: Fn(Value, &mut Session) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(SessionFnTool { func })
}
