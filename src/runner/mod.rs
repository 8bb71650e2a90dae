//! Runner - executes pipelines
//!
//! A runner holds the model client and the immutable run limits. Each call to
//! [`Runner::run`] creates a fresh session and trace, drives the run through
//! its lifecycle and returns either the final output or a [`RunError`].

pub mod run;

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent::{ExecutionContext, Pipeline};
use crate::core::{Config, ConductorError, Result, RunConfig, RunError, Session, StepResult};
use crate::llm::ModelClient;

pub use run::{Run, RunState};

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// Identifier of the run
    pub run_id: Uuid,
    /// Output of the root agent
    pub output: Value,
    /// Every primitive step result, in execution order
    pub trace: Vec<StepResult>,
    /// Session state at the end of the run
    #[serde(skip)]
    pub session: Session,
}

/// Executes pipelines against one model client
#[derive(Clone)]
pub struct Runner {
    model: Arc<dyn ModelClient>,
    config: Arc<RunConfig>,
    default_model: String,
    app_name: String,
}

impl Runner {
    /// Create a runner; the limits are validated once and never change
    pub fn new(model: Arc<dyn ModelClient>, config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config: Arc::new(config),
            default_model: "default".to_string(),
            app_name: "conductor".to_string(),
        })
    }

    /// Create a runner from the application configuration
    pub fn from_config(model: Arc<dyn ModelClient>, config: &Config) -> Result<Self> {
        Ok(Self::new(model, config.run.clone())?
            .with_default_model(&config.model.name)
            .with_app_name(&config.app_name))
    }

    /// Model name used by LLM agents that do not pick one
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Application name attached to run spans
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Run limits
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute `pipeline` on `input`
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        input: Value,
    ) -> std::result::Result<RunOutput, RunError> {
        self.run_with_cancel(pipeline, input, CancellationToken::new())
            .await
    }

    /// Execute `pipeline` on `input`, stopping early when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        pipeline: &Pipeline,
        input: Value,
        cancel: CancellationToken,
    ) -> std::result::Result<RunOutput, RunError> {
        let mut run = Run::new();
        let span = tracing::info_span!("run", run_id = %run.id(), app = %self.app_name);

        async move {
            let run_id = run.id();
            if let Err(source) = run.start() {
                return Err(RunError {
                    run_id,
                    source,
                    trace: Vec::new(),
                });
            }
            tracing::info!(root = pipeline.root().name(), "run started");

            // A child token, so a run timeout never cancels the caller's token
            let token = cancel.child_token();
            let ctx = ExecutionContext::new(
                self.model.clone(),
                pipeline.tools().clone(),
                self.config.clone(),
                self.default_model.as_str(),
                token.clone(),
            );
            let mut session = Session::new();

            let execution = pipeline.root().execute(input, &mut session, &ctx);
            let result = match self.config.run_timeout() {
                Some(limit) => match tokio::time::timeout(limit, execution).await {
                    Ok(result) => result,
                    Err(_) => {
                        token.cancel();
                        Err(ConductorError::timeout("Run", limit.as_millis() as u64))
                    }
                },
                None => execution.await,
            };
            let trace = ctx.trace().snapshot();

            match result {
                Ok(step) => {
                    run.complete().map_err(|source| RunError {
                        run_id,
                        source,
                        trace: trace.clone(),
                    })?;
                    tracing::info!(
                        steps = trace.len(),
                        elapsed_ms = run.elapsed().map_or(0, |d| d.as_millis() as u64),
                        "run completed"
                    );
                    Ok(RunOutput {
                        run_id,
                        output: step.output,
                        trace,
                        session,
                    })
                }
                Err(source) => {
                    run.fail().map_err(|transition| RunError {
                        run_id,
                        source: transition,
                        trace: trace.clone(),
                    })?;
                    tracing::warn!(error = %source, steps = trace.len(), "run failed");
                    Err(RunError {
                        run_id,
                        source,
                        trace,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }
}
