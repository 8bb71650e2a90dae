//! CLI module - command-line interface
//!
//! Contains the demo pipelines and command handlers.

pub mod commands;
pub mod demos;

pub use commands::{config_command, run_demo, DemoReport};
pub use demos::{Demo, DemoKind};
