//! Tools module - tool capabilities, schemas and the tool registry

pub mod capability;
pub mod registry;
pub mod schema;

pub use capability::{tool_fn, tool_fn_with_session, ToolCapability, ToolContext};
pub use registry::{Tool, ToolHandler, ToolRegistry};
