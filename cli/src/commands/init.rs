//! Init Command - Initialize a new engine

use std::fs;

use clap::Args;
use tracing::info;

use veilcast::service::SettlementService;
use veilcast_contracts::{SettlementEngine, DEFAULT_PERIOD_LENGTH};
use veilcast_fhe::{ClearBackend, ClearCoprocessor, InputVerifier};

use super::{parse_account, Workspace};
use crate::config::VeilcastConfig;

/// Initialize a new engine
#[derive(Args)]
pub struct InitCommand {
    /// The engine's own account (hex)
    #[arg(long)]
    host: String,

    /// Initial owner account (hex)
    #[arg(long)]
    owner: String,

    /// Seconds per settlement period
    #[arg(long, default_value_t = DEFAULT_PERIOD_LENGTH)]
    period_length: u64,

    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

impl InitCommand {
    pub async fn execute(self, workspace: &Workspace) -> anyhow::Result<()> {
        let host = parse_account(&self.host)?;
        let owner = parse_account(&self.owner)?;
        let config = VeilcastConfig::new(host, owner, self.period_length);
        config.validate()?;

        info!("Initializing veilcast engine");
        info!("Data directory: {}", workspace.data_dir.display());

        // Check if already initialized
        if workspace.config_path.exists() && !self.force {
            anyhow::bail!(
                "Engine already initialized at {}. Use --force to overwrite.",
                workspace.data_dir.display()
            );
        }

        let storage_config = config.storage_config(&workspace.data_dir);
        if storage_config.path.exists() {
            if !self.force {
                anyhow::bail!(
                    "Database already exists at {}. Use --force to overwrite.",
                    storage_config.path.display()
                );
            }
            fs::remove_file(&storage_config.path)?;
        }

        fs::create_dir_all(&workspace.data_dir)?;
        config.save(&workspace.config_path)?;
        info!("Configuration saved to {}", workspace.config_path.display());

        // Spawning against empty storage writes the genesis snapshot
        let capability = ClearCoprocessor::new(host, ClearBackend, InputVerifier::new());
        let engine = SettlementEngine::genesis(config.engine_config()?, owner, capability)?;
        let storage = workspace.open_storage(&config)?;
        let status = SettlementService::spawn(engine, Some(storage))?
            .shutdown()
            .await?;

        println!();
        println!("Veilcast engine initialized");
        println!();
        println!("Configuration:  {}", workspace.config_path.display());
        println!("Database:       {}", storage_config.path.display());
        println!("Host:           {}", host);
        println!("Owner:          {}", owner);
        println!("Period length:  {}s", self.period_length);
        println!("Genesis root:   {}", hex::encode(status.state_root));

        Ok(())
    }
}
