//! Veilcast Operator CLI
//!
//! Command-line interface for operating a veilcast settlement engine.
//!
//! # Usage
//!
//! ```bash
//! # Initialize a new engine
//! veilcast init --host 0x… --owner 0x…
//!
//! # Record today's reference value (owner)
//! veilcast record-reference --value 64000
//!
//! # Inspect state
//! veilcast reference --period 100
//! veilcast forecast --account 0x… --period 100
//! veilcast journal --from 1
//! veilcast status
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use config::VeilcastConfig;
use commands::{
    ForecastCommand, InitCommand, JournalCommand, RecordReferenceCommand, ReferenceCommand,
    StatusCommand, TransferOwnershipCommand, Workspace,
};

/// Veilcast settlement engine
#[derive(Parser)]
#[command(name = "veilcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Confidential prediction settlement engine", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long, global = true, env = "VEILCAST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON; overrides the config file
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new engine
    Init(InitCommand),

    /// Record the reference value for the current period (owner only)
    RecordReference(RecordReferenceCommand),

    /// Hand ownership to another account (owner only)
    TransferOwnership(TransferOwnershipCommand),

    /// Show a recorded reference value
    Reference(ReferenceCommand),

    /// Show an account's forecast for a period
    Forecast(ForecastCommand),

    /// List committed invocations
    Journal(JournalCommand),

    /// Show engine status
    Status(StatusCommand),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let workspace = Workspace::resolve(cli.config, cli.data_dir);

    // Initialize logging; `init` runs before any config file exists
    let settings = VeilcastConfig::load(&workspace.config_path)
        .ok()
        .map(|config| config.logging);
    let (level, json) =
        logging::resolve(cli.log_level.as_deref(), cli.json_logs, settings.as_ref());
    logging::init(&level, json)?;

    // Execute command
    match cli.command {
        Commands::Init(cmd) => cmd.execute(&workspace).await,
        Commands::RecordReference(cmd) => cmd.execute(&workspace).await,
        Commands::TransferOwnership(cmd) => cmd.execute(&workspace).await,
        Commands::Reference(cmd) => cmd.execute(&workspace),
        Commands::Forecast(cmd) => cmd.execute(&workspace),
        Commands::Journal(cmd) => cmd.execute(&workspace),
        Commands::Status(cmd) => cmd.execute(&workspace),
        Commands::Version => {
            println!("veilcast {}", veilcast::VERSION);
            Ok(())
        }
    }
}
