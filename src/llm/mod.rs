//! LLM module - model client integrations
//!
//! Provides the `ModelClient` abstraction, a scripted client for tests and
//! demos, and an Ollama adapter.

pub mod ollama;
pub mod scripted;
pub mod traits;

use std::sync::Arc;

use crate::core::config::{Config, ProviderType};
use crate::core::Result;

pub use ollama::OllamaClient;
pub use scripted::ScriptedModel;
pub use traits::{ModelClient, ModelContext, ModelResponse, Observation, TokenUsage};

/// Create a model client based on configuration.
///
/// The scripted provider has no responders, so agents get their rendered
/// prompt echoed back.
pub fn create_client(config: &Config) -> Result<Arc<dyn ModelClient>> {
    let client: Arc<dyn ModelClient> = match config.model.provider {
        ProviderType::Scripted => Arc::new(ScriptedModel::new()),
        ProviderType::Ollama => Arc::new(OllamaClient::from_config(config)?),
    };
    Ok(client)
}
