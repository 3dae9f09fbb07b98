//! Steward Control - host maintenance from one command.
//!
//! Sequences the upkeep stages, remediates the failures it recognizes,
//! and reports everything else.

use anyhow::Result;
use clap::{Parser, Subcommand};
use stewardctl::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stewardctl")]
#[command(about = "Steward - host maintenance orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full maintenance sequence
    Run {
        /// Repair unhealthy disks without prompting
        #[arg(long)]
        auto_repair: bool,
    },

    /// List the maintenance stages in execution order
    Stages,

    /// Show the configuration the next run would use
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // keep the terminal quiet by default; RUST_LOG opens it up
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run { auto_repair } => commands::run(auto_repair).await?,
        Commands::Stages => commands::stages()?,
        Commands::Config => commands::show_config()?,
    };

    std::process::exit(exit_code);
}
