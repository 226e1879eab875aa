//! docfields CLI
//!
//! Main entry point for the docfields command-line tool.
//! Extracts structured fields from large documents with an LLM.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ExtractCommand, HistoryCommand};
use docfields_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// docfields CLI - LLM-driven field extraction from large documents
#[derive(Parser, Debug)]
#[command(name = "docfields")]
#[command(about = "Extract structured fields from large documents with an LLM", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCFIELDS_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCFIELDS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (openai, ollama)
    #[arg(short, long, global = true, env = "DOCFIELDS_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "DOCFIELDS_MODEL")]
    model: Option<String>,

    /// Token budget for a single document chunk
    #[arg(long, global = true, env = "DOCFIELDS_TOKEN_BUDGET")]
    token_budget: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract fields from a document
    Extract(ExtractCommand),

    /// Inspect or record guideline and field-spec submissions
    History(HistoryCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.token_budget,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("docfields CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    // Ensure .docfields directory exists
    config.ensure_docfields_dir()?;

    let command_name = match &cli.command {
        Commands::Extract(_) => "extract",
        Commands::History(_) => "history",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Extract(cmd) => cmd.execute(&config).await,
        Commands::History(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
