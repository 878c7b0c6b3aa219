//! Owner Commands - record references and transfer ownership

use clap::Args;
use tracing::info;

use veilcast::service::SettlementService;
use veilcast_contracts::{Call, Invocation, Timestamp};

use super::{now, operator_engine, parse_account, print_json, receipt_json, Workspace};

/// Record the reference value for the current period
#[derive(Args)]
pub struct RecordReferenceCommand {
    /// Reference value (must be positive)
    #[arg(long)]
    value: u64,

    /// Invocation timestamp in seconds (defaults to now)
    #[arg(long)]
    timestamp: Option<Timestamp>,

    /// Calling account (defaults to the configured owner)
    #[arg(long)]
    caller: Option<String>,
}

impl RecordReferenceCommand {
    pub async fn execute(self, workspace: &Workspace) -> anyhow::Result<()> {
        submit(
            workspace,
            self.caller.as_deref(),
            self.timestamp,
            Call::RecordReference { value: self.value },
        )
        .await
    }
}

/// Hand ownership to another account
#[derive(Args)]
pub struct TransferOwnershipCommand {
    /// New owner account (hex)
    #[arg(long)]
    new_owner: String,

    /// Invocation timestamp in seconds (defaults to now)
    #[arg(long)]
    timestamp: Option<Timestamp>,

    /// Calling account (defaults to the configured owner)
    #[arg(long)]
    caller: Option<String>,
}

impl TransferOwnershipCommand {
    pub async fn execute(self, workspace: &Workspace) -> anyhow::Result<()> {
        let new_owner = parse_account(&self.new_owner)?;
        submit(
            workspace,
            self.caller.as_deref(),
            self.timestamp,
            Call::TransferOwnership { new_owner },
        )
        .await
    }
}

async fn submit(
    workspace: &Workspace,
    caller: Option<&str>,
    timestamp: Option<Timestamp>,
    call: Call,
) -> anyhow::Result<()> {
    let config = workspace.load_config()?;
    let storage = workspace.open_storage(&config)?;
    let engine = operator_engine(&config, &storage)?;

    // Ownership may have moved since init
    let caller = match caller {
        Some(caller) => parse_account(caller)?,
        None => engine.owner(),
    };
    let invocation = Invocation::new(caller, timestamp.unwrap_or_else(now), call);
    info!(call = invocation.call.name(), caller = %caller, "Submitting invocation");

    let service = SettlementService::spawn(engine, Some(storage))?;
    let result = service.submit(invocation).await;
    service.shutdown().await?;

    print_json(&receipt_json(&result?))
}
