//! Core module - shared infrastructure for conductor
//!
//! This module contains foundational types, session state, configuration and
//! error handling used throughout the crate.

pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::{Config, ParallelErrorPolicy, RetryPolicy, RunConfig};
pub use error::{ConductorError, Result, RunError, SchemaDirection};
pub use session::{Session, SessionDelta};
pub use types::*;
