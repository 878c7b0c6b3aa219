//! Status Command - Show engine status

use clap::Args;

use super::{now, operator_engine, Workspace};

/// Show engine status
#[derive(Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub fn execute(self, workspace: &Workspace) -> anyhow::Result<()> {
        let config = workspace.load_config()?;
        let storage = workspace.open_storage(&config)?;
        let stats = storage.stats();
        let engine = operator_engine(&config, &storage)?;
        let latest = engine.get_latest_reference();

        println!("Version:          {}", veilcast::VERSION);
        println!("Database:         {}", stats.path.display());
        println!("Host:             {}", engine.config().host);
        println!("Owner:            {}", engine.owner());
        println!("Period length:    {}s", engine.config().period_length);
        println!("Current period:   {}", engine.current_period(now()));
        println!("Sequence:         {}", engine.sequence());
        println!("State root:       {}", hex::encode(engine.state_root()));
        println!("Journal entries:  {}", stats.journal_len);
        println!("Snapshots:        {}", stats.state_snapshots);
        println!("References:       {}", engine.state().reference_count());
        println!("Forecasts:        {}", engine.state().forecast_count());
        if latest.recorded_at != 0 {
            println!("Latest reference: {} (period {})", latest.value, latest.period);
        } else {
            println!("Latest reference: none");
        }

        Ok(())
    }
}
