// Command routing and dispatch

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use paddi_config::{AiProvider, ConfigManager, PaddiConfig};
use tracing::debug;

use crate::commands::{AuditCommand, CollectCommand, Command, RunSummary};
use crate::error::{CliError, CliResult};

/// Paddi - cloud configuration audits with progressive, interactive execution
#[derive(Parser, Debug)]
#[command(name = "paddi")]
#[command(bin_name = "paddi")]
#[command(about = "Cloud configuration audits with real-time progress")]
#[command(
    long_about = "Paddi collects cloud configuration, analyses it for security risks and writes an audit report.\n\nSteps run one at a time with live progress. In verbose mode you are asked before the analysis step runs and can choose to retry, skip or abort when a step fails. Press Ctrl-C to stop after the current step."
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output and interactive decisions
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimize output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: <config dir>/paddi/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Never prompt, even on a terminal
    #[arg(long, global = true)]
    pub no_interactive: bool,

    /// Disable progress rendering
    #[arg(long, global = true)]
    pub no_visual: bool,

    /// Render each step on a single line
    #[arg(long, global = true)]
    pub compact: bool,
}

/// Audit target and collaborator flags shared by all commands
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// GCP project to audit
    #[arg(long)]
    pub project_id: Option<String>,

    /// GCP organization to audit
    #[arg(long)]
    pub organization_id: Option<String>,

    /// Region used for analysis
    #[arg(long)]
    pub location: Option<String>,

    /// Use sample data instead of live collectors
    #[arg(long)]
    pub use_mock: bool,

    /// Collect from every supported collector
    #[arg(long)]
    pub collect_all: bool,

    /// AI provider for analysis (gemini, ollama)
    #[arg(long)]
    pub ai_provider: Option<String>,

    /// Ollama model name
    #[arg(long)]
    pub ollama_model: Option<String>,

    /// Ollama server endpoint
    #[arg(long)]
    pub ollama_endpoint: Option<String>,

    /// Directory for collected data and reports
    #[arg(long)]
    pub output_dir: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the full audit pipeline: collect, explain, report
    Audit {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Collect configuration from one or more cloud providers
    Collect {
        #[command(flatten)]
        target: TargetArgs,

        /// AWS account to collect from
        #[arg(long)]
        aws_account_id: Option<String>,

        /// Azure subscription to collect from
        #[arg(long)]
        azure_subscription_id: Option<String>,
    },
}

/// Command router
pub struct CommandRouter;

impl CommandRouter {
    /// Parse arguments and execute the selected command
    pub async fn route() -> CliResult<RunSummary> {
        let cli = Cli::parse();

        // Initialize logging based on CLI flags
        crate::logging::init_logging(cli.verbose, cli.quiet);

        Self::execute(&cli).await
    }

    /// Execute a parsed command line
    pub async fn execute(cli: &Cli) -> CliResult<RunSummary> {
        let manager = match &cli.config {
            Some(path) => ConfigManager::with_path(path.clone()),
            None => ConfigManager::new(),
        };
        let mut config = manager.load()?;
        Self::apply_overrides(cli, &mut config)?;
        manager.validate(&config)?;
        debug!(command = ?cli.command, "Executing command");

        match &cli.command {
            Commands::Audit { .. } => AuditCommand::new(config, cli.verbose).execute().await,
            Commands::Collect { .. } => CollectCommand::new(config).execute().await,
        }
    }

    /// Layer command-line flags over loaded configuration
    pub fn apply_overrides(cli: &Cli, config: &mut PaddiConfig) -> CliResult<()> {
        let target = match &cli.command {
            Commands::Audit { target } => target,
            Commands::Collect {
                target,
                aws_account_id,
                azure_subscription_id,
            } => {
                if aws_account_id.is_some() {
                    config.audit.aws_account_id = aws_account_id.clone();
                }
                if azure_subscription_id.is_some() {
                    config.audit.azure_subscription_id = azure_subscription_id.clone();
                }
                target
            }
        };

        let audit = &mut config.audit;
        if target.project_id.is_some() {
            audit.project_id = target.project_id.clone();
        }
        if target.organization_id.is_some() {
            audit.organization_id = target.organization_id.clone();
        }
        if let Some(location) = &target.location {
            audit.location = location.clone();
        }
        if let Some(provider) = &target.ai_provider {
            audit.ai_provider = provider
                .parse::<AiProvider>()
                .map_err(|e| CliError::InvalidArgument {
                    message: e.to_string(),
                })?;
        }
        if let Some(model) = &target.ollama_model {
            audit.ollama_model = model.clone();
        }
        if let Some(endpoint) = &target.ollama_endpoint {
            audit.ollama_endpoint = endpoint.clone();
        }
        if let Some(output_dir) = &target.output_dir {
            audit.output_dir = output_dir.clone();
        }
        audit.use_mock |= target.use_mock;
        audit.collect_all |= target.collect_all;

        let execution = &mut config.execution;
        if cli.no_interactive {
            execution.interactive = false;
        }
        if cli.no_visual || cli.quiet {
            execution.visual = false;
        }
        if cli.compact {
            execution.compact_mode = true;
        }
        // Decisions are only asked for in verbose mode
        if cli.verbose {
            execution.auto_mode = false;
        }

        Ok(())
    }
}
