//! Conductor - agent pipeline orchestration
//!
//! Main entry point for the CLI application.

use clap::{Parser, Subcommand};
use conductor::cli::{config_command, run_demo, DemoKind};
use conductor::core::config::ProviderType;
use conductor::Config;
use tracing_subscriber::EnvFilter;

/// Conductor - compose and run agent pipelines
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug output
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one of the demo pipelines
    Demo {
        /// Which demo to run
        #[arg(value_enum)]
        kind: DemoKind,

        /// Input for the pipeline (JSON, or plain text)
        #[arg(long, short = 'i')]
        input: Option<String>,

        /// Model provider (scripted runs offline)
        #[arg(long, short = 'p', value_enum)]
        provider: Option<Provider>,

        /// Model name for LLM agents
        #[arg(long, short = 'm')]
        model: Option<String>,
    },
    /// Show the configuration
    Config {
        /// Write the configuration file
        #[arg(long)]
        save: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Provider {
    Scripted,
    Ollama,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Build configuration
    let mut config = Config::load();

    match args.command {
        Command::Demo {
            kind,
            input,
            provider,
            model,
        } => {
            // Apply CLI overrides
            if let Some(provider) = provider {
                config.model.provider = match provider {
                    Provider::Scripted => ProviderType::Scripted,
                    Provider::Ollama => ProviderType::Ollama,
                };
            }
            if let Some(model) = model {
                config.model.name = model;
            }

            let report = run_demo(kind, input.as_deref(), &config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.error.is_some() {
                std::process::exit(1);
            }
        }
        Command::Config { save } => {
            println!("{}", config_command(&config, save)?);
        }
    }

    Ok(())
}
