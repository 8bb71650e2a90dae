//! Conductor - Agent Pipeline Orchestration
//!
//! Compose LLM-backed agents and plain tools into pipelines and run them with
//! ordered traces, shared session state, cancellation and timeouts.
//!
//! # Architecture
//!
//! - **Core**: Shared types, session state, configuration, and error handling
//! - **LLM**: Model client abstraction with scripted and Ollama clients
//! - **Tools**: Tool registry, schema validation and tool capabilities
//! - **Agent**: Leaf and composite agents, pipeline composition
//! - **Runner**: Run lifecycle and pipeline execution
//! - **CLI**: Demo pipelines and command handlers
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use conductor::agent::{Composer, LlmAgent, SequentialAgent};
//! use conductor::llm::ScriptedModel;
//! use conductor::{RunConfig, Runner};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> conductor::Result<()> {
//!     let draft = LlmAgent::builder("writer")
//!         .instruction("Write a haiku about {input}")
//!         .build()?
//!         .with_output_key("draft")
//!         .shared();
//!     let review = LlmAgent::builder("reviewer")
//!         .instruction("Review this haiku: {draft}")
//!         .build()?
//!         .shared();
//!     let root = SequentialAgent::builder("poet")
//!         .agent(draft)
//!         .agent(review)
//!         .build()?
//!         .shared();
//!
//!     let pipeline = Composer::new().build(root)?;
//!     let runner = Runner::new(Arc::new(ScriptedModel::new()), RunConfig::default())?;
//!     match runner.run(&pipeline, json!("autumn")).await {
//!         Ok(output) => println!("{}", output.output),
//!         Err(err) => eprintln!("{}", err),
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod runner;
pub mod tools;

// Re-export commonly used items
pub use agent::{Agent, Composer, Pipeline};
pub use core::{Config, ConductorError, Result, RunConfig, RunError, Session, StepResult};
pub use runner::{RunOutput, RunState, Runner};
