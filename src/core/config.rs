//! Configuration management for conductor
//!
//! Supports environment variables, a config file and runtime overrides.
//! The run limits (`RunConfig`) are handed to the runner once and never
//! mutated afterwards.
//!
//! Config file location: ~/.config/conductor/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{ConductorError, Result};

/// Main configuration for conductor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name, attached to run spans
    pub app_name: String,
    /// Model selection
    pub model: ModelConfig,
    /// Ollama server configuration
    pub ollama: OllamaConfig,
    /// Run limits and policies
    #[serde(default)]
    pub run: RunConfig,
}

/// Which model client backs LLM agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Deterministic, closure driven responses
    Scripted,
    /// A local Ollama server
    Ollama,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider used for LLM agents
    pub provider: ProviderType,
    /// Default model name for LLM agents without their own
    pub name: String,
    /// Sampling temperature passed to the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// How a parallel composite reacts to a failing branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelErrorPolicy {
    /// Cancel the siblings and propagate the first failure
    #[default]
    FailFast,
    /// Let every branch finish and report failures as error markers
    BestEffort,
}

/// Opt-in retry of model and tool failures inside a leaf agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Pause between attempts in milliseconds
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// No retries at all
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            delay_ms: 0,
        }
    }

    /// Delay between attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: env::var("CONDUCTOR_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            delay_ms: env::var("CONDUCTOR_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        }
    }
}

/// Limits and policies for a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tool calls one leaf agent may make in a single step
    /// Default: 8
    pub max_tool_calls_per_step: usize,
    /// Upper bound for every loop composite
    /// Default: 10
    pub max_loop_iterations: usize,
    /// Policy for parallel composites that do not set their own
    pub parallel_error_policy: ParallelErrorPolicy,
    /// Timeout for each primitive agent execution (None disables)
    pub step_timeout_ms: Option<u64>,
    /// Timeout for the whole run (None disables)
    pub run_timeout_ms: Option<u64>,
    /// Retry policy for model and tool failures
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_tool_calls_per_step: 8,
            max_loop_iterations: 10,
            parallel_error_policy: ParallelErrorPolicy::FailFast,
            step_timeout_ms: Some(60_000),
            run_timeout_ms: Some(300_000),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Step timeout as a duration
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }

    /// Run timeout as a duration
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }

    /// Reject limits that would make every run fail or loop forever
    pub fn validate(&self) -> Result<()> {
        if self.max_loop_iterations == 0 {
            return Err(ConductorError::config("max_loop_iterations must be at least 1"));
        }
        if self.step_timeout_ms == Some(0) || self.run_timeout_ms == Some(0) {
            return Err(ConductorError::config(
                "timeouts must be positive (omit them to disable)",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: env::var("CONDUCTOR_APP_NAME").unwrap_or_else(|_| "conductor".to_string()),
            model: ModelConfig::default(),
            ollama: OllamaConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: match env::var("CONDUCTOR_PROVIDER").as_deref() {
                Ok("ollama") => ProviderType::Ollama,
                _ => ProviderType::Scripted,
            },
            name: env::var("CONDUCTOR_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
            temperature: None,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conductor")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default configuration: {e}");
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(ConductorError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ConductorError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConductorError::config(format!("Failed to parse config: {}", e)))?;
        config.run.validate()?;
        Ok(config)
    }

    /// Save configuration to file and return the path
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                ConductorError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConductorError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| ConductorError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_config() {
        let run = RunConfig::default();
        assert_eq!(run.max_tool_calls_per_step, 8);
        assert_eq!(run.max_loop_iterations, 10);
        assert_eq!(run.parallel_error_policy, ParallelErrorPolicy::FailFast);
        assert_eq!(run.step_timeout(), Some(Duration::from_secs(60)));
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip_through_toml() {
        let toml_str = Config::default_config_toml();
        assert!(toml_str.contains("max_loop_iterations"));
        assert!(toml_str.contains("fail-fast"));

        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.run.max_tool_calls_per_step, 8);
    }

    #[test]
    fn test_best_effort_policy_parses() {
        let text = r#"
            app_name = "samples"

            [model]
            provider = "scripted"
            name = "test-model"

            [ollama]
            host = "localhost"
            port = 11434
            timeout_secs = 5

            [run]
            max_tool_calls_per_step = 2
            max_loop_iterations = 4
            parallel_error_policy = "best-effort"
            step_timeout_ms = 500
        "#;
        let config = Config::from_toml(text).unwrap();
        assert_eq!(config.run.parallel_error_policy, ParallelErrorPolicy::BestEffort);
        assert_eq!(config.run.run_timeout_ms, None);
        assert_eq!(config.model.provider, ProviderType::Scripted);
    }

    #[test]
    fn test_zero_loop_bound_rejected() {
        let run = RunConfig {
            max_loop_iterations: 0,
            ..RunConfig::default()
        };
        assert!(matches!(run.validate(), Err(ConductorError::Config(_))));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("conductor"));
    }
}
