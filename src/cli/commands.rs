//! CLI commands
//!
//! Runs demos and prints the configuration.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::demos::{self, DemoKind};
use crate::core::config::{Config, ProviderType};
use crate::core::{Result, StepResult};
use crate::llm::{self, ModelClient};
use crate::runner::Runner;

/// What a demo run prints
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub demo: String,
    pub run_id: Option<Uuid>,
    pub status: &'static str,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub session: Value,
    pub trace: Vec<StepResult>,
}

/// Parse CLI input: JSON when it parses, otherwise a plain string
pub fn parse_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Build and run one demo
pub async fn run_demo(kind: DemoKind, input: Option<&str>, config: &Config) -> Result<DemoReport> {
    let demo = demos::build(kind)?;
    let model: Arc<dyn ModelClient> = match config.model.provider {
        ProviderType::Scripted => Arc::new(demo.script),
        ProviderType::Ollama => llm::create_client(config)?,
    };
    let runner = Runner::from_config(model, config)?;
    let input = input.map(parse_input).unwrap_or(demo.default_input);
    let name = format!("{:?}", kind).to_lowercase();

    let report = match runner.run(&demo.pipeline, input).await {
        Ok(output) => DemoReport {
            demo: name,
            run_id: Some(output.run_id),
            status: "COMPLETED",
            output: output.output,
            error: None,
            session: output.session.to_value(),
            trace: output.trace,
        },
        Err(err) => DemoReport {
            demo: name,
            run_id: Some(err.run_id),
            status: "FAILED",
            output: Value::Null,
            error: Some(err.source.to_string()),
            session: Value::Null,
            trace: err.trace,
        },
    };
    Ok(report)
}

/// Print or save the configuration
pub fn config_command(config: &Config, save: bool) -> Result<String> {
    if save {
        let path = config.save()?;
        return Ok(format!("Configuration saved to {}", path.display()));
    }
    toml::to_string_pretty(config)
        .map_err(|e| crate::core::ConductorError::config(format!("Failed to serialize config: {}", e)))
}
