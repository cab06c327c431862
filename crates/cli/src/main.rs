//! adpilot CLI entry point.
//!
//! Commands:
//! - `run`      Run one recommendation loop and print its output as JSON
//! - `catalog`  Print the tool manifest the model would be offered

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "adpilot",
    about = "adpilot: bounded, auditable ad recommendations",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.adpilot/config.toml)
    #[arg(short, long, global = true, env = "ADPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the recommendation loop for one organization
    Run(commands::run::RunArgs),

    /// Print the tool manifest as JSON
    Catalog(commands::catalog::CatalogArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON output
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => commands::run::run(&config, args).await?,
        Commands::Catalog(args) => commands::catalog::run(&config, args)?,
    }

    Ok(())
}
